use std::collections::HashSet;

use crate::model::*;

use super::expander::expand;
use super::EngineError;

// ── Availability index ───────────────────────────────────────────

/// Days occupied on one resource under some status filter.
///
/// Built fresh for each query or admission attempt and never cached: it is
/// only as current as the reservation list it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupiedDateSet {
    days: HashSet<Day>,
}

impl OccupiedDateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, day: Day) -> bool {
        self.days.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Day> + '_ {
        self.days.iter().copied()
    }

    /// All occupied days, ascending.
    pub fn to_sorted_vec(&self) -> Vec<Day> {
        let mut days: Vec<Day> = self.days.iter().copied().collect();
        days.sort_unstable();
        days
    }

    /// Union in every day of `[check_in, check_out]`.
    pub fn occupy(&mut self, check_in: Day, check_out: Day) -> Result<(), EngineError> {
        let range = expand(check_in, check_out)?;
        self.days.reserve(range.len());
        self.days.extend(range);
        Ok(())
    }
}

impl FromIterator<Day> for OccupiedDateSet {
    fn from_iter<I: IntoIterator<Item = Day>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().collect(),
        }
    }
}

/// Union of the expanded stays of every reservation whose status is in `include`.
///
/// A stored reservation with `check_in > check_out` is reported, not skipped.
pub fn build_occupied<'a, I>(reservations: I, include: StatusFilter) -> Result<OccupiedDateSet, EngineError>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let mut index = OccupiedDateSet::new();
    if include.is_empty() {
        return Ok(index);
    }
    for r in reservations {
        if include.contains(r.status) {
            index.occupy(r.check_in, r.check_out)?;
        }
    }
    Ok(index)
}

pub fn is_occupied(day: Day, index: &OccupiedDateSet) -> bool {
    index.contains(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn day(y: i32, m: u32, d: u32) -> Day {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reservation(check_in: Day, check_out: Day, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Ulid::new(),
            resource_id: Ulid::new(),
            check_in,
            check_out,
            status,
            created_at: 0,
        }
    }

    #[test]
    fn confirmed_only_by_default() {
        let list = vec![
            reservation(day(2024, 3, 1), day(2024, 3, 5), ReservationStatus::Confirmed),
            reservation(day(2024, 4, 1), day(2024, 4, 2), ReservationStatus::Requested),
        ];
        let index = build_occupied(&list, StatusFilter::default()).unwrap();
        assert_eq!(index.len(), 5);
        assert!(is_occupied(day(2024, 3, 1), &index));
        assert!(is_occupied(day(2024, 3, 5), &index));
        assert!(!is_occupied(day(2024, 3, 6), &index));
        assert!(!is_occupied(day(2024, 4, 1), &index));
        assert!(!is_occupied(day(2024, 4, 2), &index));
    }

    #[test]
    fn widened_filter_includes_requested() {
        let list = vec![reservation(day(2024, 4, 1), day(2024, 4, 2), ReservationStatus::Requested)];
        let filter = StatusFilter::default().with(ReservationStatus::Requested);
        let index = build_occupied(&list, filter).unwrap();
        assert_eq!(index.to_sorted_vec(), vec![day(2024, 4, 1), day(2024, 4, 2)]);
    }

    #[test]
    fn cancelled_only_visible_when_asked_for() {
        let list = vec![reservation(day(2024, 7, 1), day(2024, 7, 3), ReservationStatus::Cancelled)];
        assert!(build_occupied(&list, StatusFilter::default()).unwrap().is_empty());
        let cancelled = build_occupied(&list, StatusFilter::only(ReservationStatus::Cancelled)).unwrap();
        assert_eq!(cancelled.len(), 3);
    }

    #[test]
    fn overlapping_stays_union_without_duplicates() {
        let list = vec![
            reservation(day(2024, 3, 1), day(2024, 3, 5), ReservationStatus::Confirmed),
            reservation(day(2024, 3, 4), day(2024, 3, 8), ReservationStatus::Confirmed),
        ];
        let index = build_occupied(&list, StatusFilter::default()).unwrap();
        assert_eq!(index.len(), 8);
        let sorted = index.to_sorted_vec();
        assert_eq!(sorted.first(), Some(&day(2024, 3, 1)));
        assert_eq!(sorted.last(), Some(&day(2024, 3, 8)));
    }

    #[test]
    fn empty_filter_builds_empty_index() {
        let list = vec![reservation(day(2024, 3, 1), day(2024, 3, 5), ReservationStatus::Confirmed)];
        assert!(build_occupied(&list, StatusFilter::empty()).unwrap().is_empty());
    }

    #[test]
    fn corrupt_stored_range_is_reported() {
        let list = vec![reservation(day(2024, 3, 5), day(2024, 3, 1), ReservationStatus::Confirmed)];
        assert!(matches!(
            build_occupied(&list, StatusFilter::default()),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn corrupt_range_outside_filter_is_ignored() {
        let list = vec![reservation(day(2024, 3, 5), day(2024, 3, 1), ReservationStatus::Cancelled)];
        assert!(build_occupied(&list, StatusFilter::default()).unwrap().is_empty());
    }
}
