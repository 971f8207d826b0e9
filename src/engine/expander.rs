use std::iter::FusedIterator;

use crate::limits::MAX_RANGE_DAYS;
use crate::model::Day;

use super::{EngineError, RangeError};

/// Every day of an inclusive range `[check_in, check_out]`, ascending.
///
/// Lazy, so a conflict scan can stop at the first occupied day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRange {
    next: Option<Day>,
    last: Day,
}

impl DayRange {
    /// Days not yet yielded.
    pub fn remaining(&self) -> usize {
        match self.next {
            Some(day) => self.last.signed_duration_since(day).num_days() as usize + 1,
            None => 0,
        }
    }
}

impl Iterator for DayRange {
    type Item = Day;

    fn next(&mut self) -> Option<Day> {
        let day = self.next?;
        self.next = if day < self.last { day.succ_opt() } else { None };
        Some(day)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for DayRange {}

impl FusedIterator for DayRange {}

/// Expand a stay into the days it occupies. Both endpoints are included, so
/// `expand(d, d)` is the single day `d`.
pub fn expand(check_in: Day, check_out: Day) -> Result<DayRange, EngineError> {
    if check_in > check_out {
        return Err(RangeError::Reversed { check_in, check_out }.into());
    }
    Ok(DayRange {
        next: Some(check_in),
        last: check_out,
    })
}

/// Boundary validation for caller-supplied ranges: ordering plus width.
pub(crate) fn validate_range(check_in: Day, check_out: Day) -> Result<(), EngineError> {
    if check_in > check_out {
        return Err(RangeError::Reversed { check_in, check_out }.into());
    }
    if check_out.signed_duration_since(check_in).num_days() >= MAX_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Day {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn single_day_range() {
        let days: Vec<_> = expand(day(2024, 3, 1), day(2024, 3, 1)).unwrap().collect();
        assert_eq!(days, vec![day(2024, 3, 1)]);
    }

    #[test]
    fn both_endpoints_included() {
        let days: Vec<_> = expand(day(2024, 3, 1), day(2024, 3, 5)).unwrap().collect();
        assert_eq!(days.len(), 5);
        assert_eq!(days.first(), Some(&day(2024, 3, 1)));
        assert_eq!(days.last(), Some(&day(2024, 3, 5)));
    }

    #[test]
    fn crosses_leap_day_and_month_end() {
        let days: Vec<_> = expand(day(2024, 2, 27), day(2024, 3, 2)).unwrap().collect();
        assert_eq!(
            days,
            vec![
                day(2024, 2, 27),
                day(2024, 2, 28),
                day(2024, 2, 29),
                day(2024, 3, 1),
                day(2024, 3, 2),
            ]
        );
    }

    #[test]
    fn crosses_year_end() {
        let days: Vec<_> = expand(day(2023, 12, 30), day(2024, 1, 2)).unwrap().collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], day(2024, 1, 1));
    }

    #[test]
    fn reversed_range_is_an_error() {
        let err = expand(day(2024, 6, 10), day(2024, 6, 5)).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidRange(RangeError::Reversed {
                check_in: day(2024, 6, 10),
                check_out: day(2024, 6, 5),
            })
        );
    }

    #[test]
    fn exact_size_tracks_progress() {
        let mut range = expand(day(2024, 1, 1), day(2024, 1, 10)).unwrap();
        assert_eq!(range.len(), 10);
        range.next();
        range.next();
        assert_eq!(range.len(), 8);
        range.by_ref().for_each(drop);
        assert_eq!(range.len(), 0);
        assert_eq!(range.next(), None);
    }

    #[test]
    fn range_at_calendar_maximum_terminates() {
        let days: Vec<_> = expand(Day::MAX, Day::MAX).unwrap().collect();
        assert_eq!(days, vec![Day::MAX]);
    }

    #[test]
    fn validate_range_width() {
        let start = day(2024, 1, 1);
        assert!(validate_range(start, start).is_ok());
        let widest = start + chrono::Duration::days(MAX_RANGE_DAYS - 1);
        assert!(validate_range(start, widest).is_ok());
        let too_wide = start + chrono::Duration::days(MAX_RANGE_DAYS);
        assert_eq!(
            validate_range(start, too_wide),
            Err(EngineError::LimitExceeded("date range too wide"))
        );
    }

    #[test]
    fn validate_range_rejects_reversed() {
        assert!(matches!(
            validate_range(day(2024, 1, 2), day(2024, 1, 1)),
            Err(EngineError::InvalidRange(RangeError::Reversed { .. }))
        ));
    }
}
