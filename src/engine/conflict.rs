use crate::model::Day;

use super::availability::OccupiedDateSet;
use super::expander::expand;
use super::EngineError;

/// The earliest day of `[start, end]` already in `index`, if any.
///
/// Days are scanned in ascending order and the scan stops at the first hit.
pub fn first_conflict(start: Day, end: Day, index: &OccupiedDateSet) -> Result<Option<Day>, EngineError> {
    let mut range = expand(start, end)?;
    if index.is_empty() {
        return Ok(None);
    }
    Ok(range.find(|day| index.contains(*day)))
}

/// True iff some day of `[start, end]` is occupied.
pub fn has_conflict(start: Day, end: Day, index: &OccupiedDateSet) -> Result<bool, EngineError> {
    Ok(first_conflict(start, end, index)?.is_some())
}
