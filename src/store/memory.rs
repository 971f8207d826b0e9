use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{now_ms, ReservationStore, StoreError};

#[derive(Debug, Clone)]
struct ResourceRecord {
    resource: Resource,
    /// Sorted by `check_in`.
    reservations: Vec<Reservation>,
}

impl ResourceRecord {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            reservations: Vec::new(),
        }
    }

    /// Insert maintaining sort order by check_in.
    fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.check_in <= reservation.check_in);
        self.reservations.insert(pos, reservation);
    }
}

/// Volatile store. Also the in-memory state behind [`super::DurableStore`]:
/// every mutation is planned into an [`Event`] first, then applied, so a log
/// can sit between the two steps.
pub struct InMemoryStore {
    resources: DashMap<Ulid, ResourceRecord>,
    /// Reverse lookup: reservation id → resource id
    reservation_to_resource: DashMap<Ulid, Ulid>,
    /// Reservation ids planned but not yet applied, with their resource.
    claims: DashMap<Ulid, Ulid>,
}

/// Reservation ids held by one planned write. Released on drop, which must
/// come after the write's events were applied or abandoned.
pub(super) struct IdClaim<'a> {
    claims: &'a DashMap<Ulid, Ulid>,
    ids: Vec<Ulid>,
}

impl Drop for IdClaim<'_> {
    fn drop(&mut self) {
        for id in &self.ids {
            self.claims.remove(id);
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            reservation_to_resource: DashMap::new(),
            claims: DashMap::new(),
        }
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservation_to_resource.len()
    }

    // ── Planning: validate against current state, produce events ──

    pub(super) fn plan_create_resource(&self, id: Ulid, name: Option<String>) -> Result<Event, StoreError> {
        if self.resources.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        if self.resources.len() >= MAX_RESOURCES {
            return Err(StoreError::LimitExceeded("too many resources"));
        }
        if name.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN) {
            return Err(StoreError::LimitExceeded("resource name too long"));
        }
        Ok(Event::ResourceCreated { id, name })
    }

    /// Validate a batch of new reservations and claim their ids.
    ///
    /// The claim is taken before the applied ids are consulted, and apply
    /// records an id before its claim is released, so two writers racing on
    /// one id (even on different resources) cannot both pass.
    pub(super) fn plan_create_reservations(
        &self,
        requests: &[ReservationRequest],
        created_at: Ms,
    ) -> Result<(Vec<Event>, IdClaim<'_>), StoreError> {
        let mut claim = IdClaim {
            claims: &self.claims,
            ids: Vec::with_capacity(requests.len()),
        };
        let mut events = Vec::with_capacity(requests.len());
        for req in requests {
            match self.claims.entry(req.id) {
                Entry::Occupied(_) => return Err(StoreError::AlreadyExists(req.id)),
                Entry::Vacant(slot) => {
                    slot.insert(req.resource_id);
                }
            }
            claim.ids.push(req.id);
            if self.reservation_to_resource.contains_key(&req.id) {
                return Err(StoreError::AlreadyExists(req.id));
            }
            let record = self
                .resources
                .get(&req.resource_id)
                .ok_or(StoreError::ResourceNotFound(req.resource_id))?;
            let pending = requests
                .iter()
                .filter(|r| r.resource_id == req.resource_id)
                .count();
            if record.reservations.len() + pending > MAX_RESERVATIONS_PER_RESOURCE {
                return Err(StoreError::LimitExceeded("too many reservations on resource"));
            }
            events.push(Event::ReservationCreated {
                id: req.id,
                resource_id: req.resource_id,
                check_in: req.check_in,
                check_out: req.check_out,
                status: req.status,
                created_at,
            });
        }
        Ok((events, claim))
    }

    pub(super) fn plan_set_status(&self, id: Ulid, status: ReservationStatus) -> Result<Event, StoreError> {
        let resource_id = self
            .reservation_to_resource
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::ReservationNotFound(id))?;
        Ok(Event::StatusChanged { id, resource_id, status })
    }

    // ── Event application ────────────────────────────────────

    /// Apply an event. Replaying the same log twice yields the same state.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::ResourceCreated { id, name } => {
                self.resources.entry(*id).or_insert_with(|| {
                    ResourceRecord::new(Resource {
                        id: *id,
                        name: name.clone(),
                    })
                });
            }
            Event::ReservationCreated {
                id,
                resource_id,
                check_in,
                check_out,
                status,
                created_at,
            } => {
                if self.reservation_to_resource.contains_key(id) {
                    return;
                }
                if let Some(mut record) = self.resources.get_mut(resource_id) {
                    record.insert_reservation(Reservation {
                        id: *id,
                        resource_id: *resource_id,
                        check_in: *check_in,
                        check_out: *check_out,
                        status: *status,
                        created_at: *created_at,
                    });
                    drop(record);
                    self.reservation_to_resource.insert(*id, *resource_id);
                }
            }
            Event::StatusChanged { id, resource_id, status } => {
                if let Some(mut record) = self.resources.get_mut(resource_id)
                    && let Some(r) = record.reservations.iter_mut().find(|r| r.id == *id)
                {
                    r.status = *status;
                }
            }
        }
    }

    /// The minimal event list that recreates the current state.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for entry in self.resources.iter() {
            let record = entry.value();
            events.push(Event::ResourceCreated {
                id: record.resource.id,
                name: record.resource.name.clone(),
            });
            for r in &record.reservations {
                events.push(Event::ReservationCreated {
                    id: r.id,
                    resource_id: r.resource_id,
                    check_in: r.check_in,
                    check_out: r.check_out,
                    status: r.status,
                    created_at: r.created_at,
                });
            }
        }
        events
    }

    fn lookup_reservation(&self, id: Ulid) -> Result<Reservation, StoreError> {
        let resource_id = self
            .reservation_to_resource
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::ReservationNotFound(id))?;
        self.resources
            .get(&resource_id)
            .and_then(|record| record.reservations.iter().find(|r| r.id == id).cloned())
            .ok_or(StoreError::ReservationNotFound(id))
    }

    pub(super) fn resource(&self, id: Ulid) -> Result<Resource, StoreError> {
        self.resources
            .get(&id)
            .map(|record| record.resource.clone())
            .ok_or(StoreError::ResourceNotFound(id))
    }

    pub(super) fn resources(&self) -> Vec<Resource> {
        let mut list: Vec<Resource> = self
            .resources
            .iter()
            .map(|e| e.value().resource.clone())
            .collect();
        list.sort_by_key(|r| r.id);
        list
    }

    pub(super) fn reservations_of(&self, resource_id: Ulid) -> Result<Vec<Reservation>, StoreError> {
        self.resources
            .get(&resource_id)
            .map(|record| record.reservations.clone())
            .ok_or(StoreError::ResourceNotFound(resource_id))
    }

    pub(super) fn reservation(&self, id: Ulid) -> Result<Reservation, StoreError> {
        self.lookup_reservation(id)
    }

    /// The stored rows of freshly applied requests. A row on another resource
    /// means the write did not land.
    pub(super) fn created_rows(&self, requests: &[ReservationRequest]) -> Result<Vec<Reservation>, StoreError> {
        requests
            .iter()
            .map(|req| {
                let row = self.lookup_reservation(req.id)?;
                if row.resource_id != req.resource_id {
                    return Err(StoreError::AlreadyExists(req.id));
                }
                Ok(row)
            })
            .collect()
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<Resource, StoreError> {
        let event = self.plan_create_resource(id, name)?;
        self.apply_event(&event);
        self.resource(id)
    }

    async fn get_resource(&self, id: Ulid) -> Result<Resource, StoreError> {
        self.resource(id)
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        Ok(self.resources())
    }

    async fn list_reservations(&self, resource_id: Ulid) -> Result<Vec<Reservation>, StoreError> {
        self.reservations_of(resource_id)
    }

    async fn get_reservation(&self, id: Ulid) -> Result<Reservation, StoreError> {
        self.lookup_reservation(id)
    }

    async fn create_reservation(&self, request: &ReservationRequest) -> Result<Reservation, StoreError> {
        let mut created = self.create_reservations(std::slice::from_ref(request)).await?;
        created.pop().ok_or(StoreError::ReservationNotFound(request.id))
    }

    async fn create_reservations(&self, requests: &[ReservationRequest]) -> Result<Vec<Reservation>, StoreError> {
        let (events, claim) = self.plan_create_reservations(requests, now_ms())?;
        for event in &events {
            self.apply_event(event);
        }
        drop(claim);
        self.created_rows(requests)
    }

    async fn set_status(&self, id: Ulid, status: ReservationStatus) -> Result<Reservation, StoreError> {
        let event = self.plan_set_status(id, status)?;
        self.apply_event(&event);
        self.lookup_reservation(id)
    }
}
