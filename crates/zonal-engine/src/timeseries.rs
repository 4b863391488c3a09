//! Resolving requested timestamps against the dates a series holds.

use chrono::{DateTime, Utc};
use mangrove_common::same_date;

use crate::collection::ImageCollection;

/// Requested timestamps for which `collection` holds an image on the same
/// date, ascending and without duplicate dates.
///
/// Requested dates the series lacks are dropped silently; callers decide how
/// to report the gap.
pub fn filter_timestamps(collection: &ImageCollection, requested: &[DateTime<Utc>]) -> Vec<DateTime<Utc>> {
    let available = collection.dates();
    resolve(requested, |ts| available.iter().any(|d| same_date(d, ts)))
}

/// Requested timestamps present in both series.
pub fn intersect_timestamps(
    a: &ImageCollection,
    b: &ImageCollection,
    requested: &[DateTime<Utc>],
) -> Vec<DateTime<Utc>> {
    let (in_a, in_b) = (a.dates(), b.dates());
    resolve(requested, |ts| {
        in_a.iter().any(|d| same_date(d, ts)) && in_b.iter().any(|d| same_date(d, ts))
    })
}

fn resolve<F>(requested: &[DateTime<Utc>], available: F) -> Vec<DateTime<Utc>>
where
    F: Fn(&DateTime<Utc>) -> bool,
{
    let mut resolved: Vec<DateTime<Utc>> = requested.iter().copied().filter(|ts| available(ts)).collect();
    resolved.sort();
    resolved.dedup_by(|a, b| same_date(a, b));
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Image;
    use crate::expr::RasterExpr;
    use mangrove_common::parse_timestamp;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn series(dates: &[&str]) -> ImageCollection {
        ImageCollection::new(
            "series",
            dates
                .iter()
                .map(|d| Image::new(RasterExpr::source(*d), "b1", ts(d), "1"))
                .collect(),
        )
    }

    #[test]
    fn test_filter_drops_absent_and_sorts() {
        let s = series(&["1996-01-01", "2007-01-01", "2016-01-01"]);
        let requested = vec![ts("2016-01-01"), ts("2020-01-01"), ts("1996-01-01")];
        assert_eq!(filter_timestamps(&s, &requested), vec![ts("1996-01-01"), ts("2016-01-01")]);
    }

    #[test]
    fn test_filter_deduplicates_by_date() {
        let s = series(&["2016-01-01"]);
        let requested = vec![ts("2016-01-01T06:00:00Z"), ts("2016-01-01")];
        assert_eq!(filter_timestamps(&s, &requested), vec![ts("2016-01-01")]);
    }

    #[test]
    fn test_intersection_of_two_series() {
        let agb = series(&["2000-01-01", "2016-01-01"]);
        let soc = series(&["2016-01-01"]);
        let requested = vec![ts("2000-01-01"), ts("2016-01-01")];
        assert_eq!(intersect_timestamps(&agb, &soc, &requested), vec![ts("2016-01-01")]);
    }

    #[test]
    fn test_empty_request() {
        assert!(filter_timestamps(&series(&["2016-01-01"]), &[]).is_empty());
    }
}
