//! Reservation availability engine served over the Postgres wire protocol.
//!
//! Stays are inclusive day ranges `[check_in, check_out]`: a stay occupies
//! its check-out day, so two stays sharing a boundary day conflict.

pub mod auth;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod sql;
pub mod store;
pub mod tls;
pub mod wal;
pub mod wire;

pub use engine::{Engine, EngineError};
pub use model::{Day, Reservation, ReservationRequest, ReservationStatus, StatusFilter};
