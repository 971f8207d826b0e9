//! Persistence collaborators for the engine.
//!
//! The engine only ever talks to [`ReservationStore`]. Two implementations
//! ship with the crate: [`InMemoryStore`] (volatile) and [`DurableStore`],
//! which puts a write-ahead log in front of the in-memory state.

mod durable;
mod memory;

pub use durable::DurableStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    ResourceNotFound(Ulid),
    #[error("reservation not found: {0}")]
    ReservationNotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<Resource, StoreError>;

    async fn get_resource(&self, id: Ulid) -> Result<Resource, StoreError>;

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;

    /// All reservations of a resource, every status, sorted by check-in.
    async fn list_reservations(&self, resource_id: Ulid) -> Result<Vec<Reservation>, StoreError>;

    async fn get_reservation(&self, id: Ulid) -> Result<Reservation, StoreError>;

    async fn create_reservation(&self, request: &ReservationRequest) -> Result<Reservation, StoreError>;

    /// Persist several reservations. Implementations should make this
    /// all-or-nothing; the default does not and stops at the first failure.
    async fn create_reservations(&self, requests: &[ReservationRequest]) -> Result<Vec<Reservation>, StoreError> {
        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            created.push(self.create_reservation(request).await?);
        }
        Ok(created)
    }

    async fn set_status(&self, id: Ulid, status: ReservationStatus) -> Result<Reservation, StoreError>;
}

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}
