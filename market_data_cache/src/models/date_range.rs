//! Closed calendar-date intervals.
//!
//! A [`DateRange`] is both a request parameter ("give me bars for these days")
//! and the unit of missing data reported by gap detection. Both endpoints are
//! inclusive, and when filtering minute bars the end date covers its whole
//! day.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A closed interval of calendar dates, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

impl DateRange {
    /// Construct a range. Returns `None` when `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Calendar years overlapping this range, ascending.
    pub fn years(&self) -> RangeInclusive<i32> {
        use chrono::Datelike;
        self.start.year()..=self.end.year()
    }

    /// Whether a UTC timestamp falls on one of the range's days.
    pub fn contains_timestamp(&self, ts: DateTime<Utc>) -> bool {
        let day = ts.date_naive();
        self.start <= day && day <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_inverted_range() {
        let d1 = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(DateRange::new(d1, d2).is_none());
        assert!(DateRange::new(d2, d1).is_some());
        assert!(DateRange::new(d1, d1).is_some());
    }

    #[test]
    fn end_day_is_inclusive_through_midnight() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
        )
        .unwrap();
        let late = Utc.with_ymd_and_hms(2023, 1, 2, 23, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2023, 1, 3, 0, 0, 0).unwrap();
        assert!(range.contains_timestamp(late));
        assert!(!range.contains_timestamp(after));
    }

    #[test]
    fn years_span_calendar_boundaries() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2021, 11, 20).unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(range.years().collect::<Vec<_>>(), vec![2021, 2022, 2023]);
    }
}
