use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use crate::engine::{EngineError, RangeError};

/// Calendar day. No time-of-day component.
pub type Day = NaiveDate;

/// Unix milliseconds. Record timestamps only, never used for occupancy.
pub type Ms = i64;

/// Parse a calendar day from text.
///
/// Accepts `YYYY-MM-DD`, optionally followed by a time-of-day (`T` or space
/// separated, with or without an offset). The time-of-day is dropped; an
/// offset-qualified timestamp keeps the date as written in its own offset.
pub fn parse_day(s: &str) -> Result<Day, EngineError> {
    let s = s.trim();
    let not_a_date = || EngineError::InvalidRange(RangeError::NotADate(s.to_string()));

    if s.len() <= 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| not_a_date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.date_naive());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(not_a_date())
}

/// Lifecycle state of a reservation. Transitions are driven by the booking
/// workflow; the engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Requested,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 4] = [
        ReservationStatus::Requested,
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Requested => "requested",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reservation status: {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for ReservationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // legacy alias
            "requested" | "pending" => Ok(ReservationStatus::Requested),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            "completed" => Ok(ReservationStatus::Completed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A set of statuses, used to decide which reservations block a calendar.
///
/// The default is `{confirmed}`: only confirmed stays occupy dates.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusFilter(u8);

impl StatusFilter {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn only(status: ReservationStatus) -> Self {
        Self(status.bit())
    }

    pub const fn all() -> Self {
        Self(0b1111)
    }

    pub const fn with(self, status: ReservationStatus) -> Self {
        Self(self.0 | status.bit())
    }

    pub const fn without(self, status: ReservationStatus) -> Self {
        Self(self.0 & !status.bit())
    }

    pub const fn contains(self, status: ReservationStatus) -> bool {
        self.0 & status.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = ReservationStatus> {
        ReservationStatus::ALL
            .into_iter()
            .filter(move |s| self.contains(*s))
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::only(ReservationStatus::Confirmed)
    }
}

impl FromIterator<ReservationStatus> for StatusFilter {
    fn from_iter<I: IntoIterator<Item = ReservationStatus>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, status) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(status.as_str())?;
        }
        f.write_str("}")
    }
}

/// A stay on a resource. `[check_in, check_out]` is inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub check_in: Day,
    pub check_out: Day,
    pub status: ReservationStatus,
    pub created_at: Ms,
}

/// Input to admission: the reservation a caller wants persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub check_in: Day,
    pub check_out: Day,
    pub status: ReservationStatus,
}

impl ReservationRequest {
    /// A confirmed stay with a freshly generated id.
    pub fn new(resource_id: Ulid, check_in: Day, check_out: Day) -> Self {
        Self {
            id: Ulid::new(),
            resource_id,
            check_in,
            check_out,
            status: ReservationStatus::Confirmed,
        }
    }

    pub fn with_id(mut self, id: Ulid) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = status;
        self
    }
}

/// A bookable resource (a property, a room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub name: Option<String>,
}

/// Answer of an availability check for one candidate stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub resource_id: Ulid,
    pub check_in: Day,
    pub check_out: Day,
    pub available: bool,
}

/// Store events, flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        name: Option<String>,
    },
    ReservationCreated {
        id: Ulid,
        resource_id: Ulid,
        check_in: Day,
        check_out: Day,
        status: ReservationStatus,
        created_at: Ms,
    },
    StatusChanged {
        id: Ulid,
        resource_id: Ulid,
        status: ReservationStatus,
    },
}

impl Event {
    pub fn resource_id(&self) -> Ulid {
        match self {
            Event::ResourceCreated { id, .. } => *id,
            Event::ReservationCreated { resource_id, .. }
            | Event::StatusChanged { resource_id, .. } => *resource_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> Day {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_plain_date() {
        assert_eq!(parse_day("2024-03-01").unwrap(), day(2024, 3, 1));
        assert_eq!(parse_day("  2024-03-01 ").unwrap(), day(2024, 3, 1));
    }

    #[test]
    fn parse_truncates_time_of_day() {
        assert_eq!(parse_day("2024-03-01T15:00:00").unwrap(), day(2024, 3, 1));
        assert_eq!(parse_day("2024-03-01 23:59:59").unwrap(), day(2024, 3, 1));
        assert_eq!(parse_day("2024-03-01T10:30").unwrap(), day(2024, 3, 1));
    }

    #[test]
    fn parse_offset_timestamp_keeps_its_own_date() {
        // 23:00 at -07:00 is already the next day in UTC; the written date wins
        assert_eq!(
            parse_day("2022-12-26T23:00:00-07:00").unwrap(),
            day(2022, 12, 26)
        );
        assert_eq!(
            parse_day("2022-12-26T15:00:00-0700").unwrap(),
            day(2022, 12, 26)
        );
    }

    #[test]
    fn parse_rejects_impossible_dates() {
        for bad in ["2024-02-30", "2023-02-29", "2024-13-01", "yesterday", "", "2024-03-01Tnoon"] {
            let err = parse_day(bad).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidRange(RangeError::NotADate(_))),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn parse_accepts_leap_day() {
        assert_eq!(parse_day("2024-02-29").unwrap(), day(2024, 2, 29));
    }

    #[test]
    fn status_parse_and_display() {
        assert_eq!("confirmed".parse(), Ok(ReservationStatus::Confirmed));
        assert_eq!("PENDING".parse(), Ok(ReservationStatus::Requested));
        assert_eq!("canceled".parse(), Ok(ReservationStatus::Cancelled));
        assert!("archived".parse::<ReservationStatus>().is_err());
        assert_eq!(ReservationStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn default_filter_is_confirmed_only() {
        let f = StatusFilter::default();
        assert!(f.contains(ReservationStatus::Confirmed));
        assert!(!f.contains(ReservationStatus::Requested));
        assert!(!f.contains(ReservationStatus::Cancelled));
        assert!(!f.contains(ReservationStatus::Completed));
    }

    #[test]
    fn filter_set_operations() {
        let f = StatusFilter::default().with(ReservationStatus::Requested);
        assert_eq!(
            f.iter().collect::<Vec<_>>(),
            vec![ReservationStatus::Requested, ReservationStatus::Confirmed]
        );
        assert_eq!(f.to_string(), "{requested, confirmed}");

        let g = f.without(ReservationStatus::Confirmed);
        assert_eq!(g, StatusFilter::only(ReservationStatus::Requested));
        assert!(StatusFilter::empty().is_empty());
        assert_eq!(StatusFilter::all().iter().count(), 4);
    }

    #[test]
    fn filter_from_iter() {
        let f: StatusFilter = [ReservationStatus::Cancelled, ReservationStatus::Cancelled]
            .into_iter()
            .collect();
        assert_eq!(f, StatusFilter::only(ReservationStatus::Cancelled));
    }

    #[test]
    fn request_builder() {
        let rid = Ulid::new();
        let id = Ulid::new();
        let req = ReservationRequest::new(rid, day(2024, 5, 10), day(2024, 5, 12))
            .with_id(id)
            .with_status(ReservationStatus::Requested);
        assert_eq!(req.id, id);
        assert_eq!(req.resource_id, rid);
        assert_eq!(req.status, ReservationStatus::Requested);
        assert_eq!(
            ReservationRequest::new(rid, day(2024, 5, 10), day(2024, 5, 12)).status,
            ReservationStatus::Confirmed
        );
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            id: Ulid::new(),
            resource_id: Ulid::new(),
            check_in: day(2024, 3, 1),
            check_out: day(2024, 3, 5),
            status: ReservationStatus::Confirmed,
            created_at: 1_700_000_000_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
