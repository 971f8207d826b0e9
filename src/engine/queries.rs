use ulid::Ulid;

use crate::model::*;

use super::availability::{build_occupied, OccupiedDateSet};
use super::conflict::has_conflict;
use super::{validate_range, Engine, EngineError};

/// Read-only queries. None of these take the per-resource lock; each result
/// reflects the store at the moment it was read.
impl Engine {
    /// Days occupied on `resource_id` by reservations whose status is in
    /// `include` (default `{confirmed}`).
    pub async fn get_occupied_dates(
        &self,
        resource_id: Ulid,
        include: Option<StatusFilter>,
    ) -> Result<OccupiedDateSet, EngineError> {
        let reservations = self.store.list_reservations(resource_id).await?;
        build_occupied(&reservations, include.unwrap_or_default())
    }

    /// Whether `[check_in, check_out]` is free under the admission filter,
    /// i.e. whether an admission for it would currently be accepted.
    pub async fn check_availability(
        &self,
        resource_id: Ulid,
        check_in: Day,
        check_out: Day,
    ) -> Result<Availability, EngineError> {
        validate_range(check_in, check_out)?;
        let reservations = self.store.list_reservations(resource_id).await?;
        let index = build_occupied(&reservations, self.admission_filter)?;
        let available = !has_conflict(check_in, check_out, &index)?;
        Ok(Availability {
            resource_id,
            check_in,
            check_out,
            available,
        })
    }

    /// Reservations of a resource with a status in `filter`, sorted by check-in.
    pub async fn list_reservations(
        &self,
        resource_id: Ulid,
        filter: StatusFilter,
    ) -> Result<Vec<Reservation>, EngineError> {
        let mut reservations = self.store.list_reservations(resource_id).await?;
        reservations.retain(|r| filter.contains(r.status));
        Ok(reservations)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        Ok(self.store.get_reservation(id).await?)
    }

    pub async fn get_resource(&self, id: Ulid) -> Result<Resource, EngineError> {
        Ok(self.store.get_resource(id).await?)
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, EngineError> {
        Ok(self.store.list_resources().await?)
    }
}
