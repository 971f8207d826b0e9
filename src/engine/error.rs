use thiserror::Error;
use ulid::Ulid;

use crate::model::Day;
use crate::store::StoreError;

/// Why a date range was refused. Ranges are never swapped or clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("check-in {check_in} is after check-out {check_out}")]
    Reversed { check_in: Day, check_out: Day },
    #[error("not a calendar date: {0:?}")]
    NotADate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeError),
    #[error("resource not found: {0}")]
    ResourceNotFound(Ulid),
    #[error("reservation not found: {0}")]
    ReservationNotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl EngineError {
    /// The caller sent something the engine will never accept as-is.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRange(_) | EngineError::LimitExceeded(_) | EngineError::AlreadyExists(_)
        )
    }

    /// Transient system failure; the caller may retry under its own policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::PersistenceUnavailable(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ResourceNotFound(id) => EngineError::ResourceNotFound(id),
            StoreError::ReservationNotFound(id) => EngineError::ReservationNotFound(id),
            StoreError::AlreadyExists(id) => EngineError::AlreadyExists(id),
            StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            StoreError::Unavailable(msg) => EngineError::PersistenceUnavailable(msg),
        }
    }
}
