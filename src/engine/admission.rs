use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::time::Instant;

use tracing::debug;
use ulid::Ulid;

use crate::limits::MAX_BATCH_SIZE;
use crate::model::*;
use crate::observability::{ADMISSIONS_TOTAL, ADMISSION_DURATION_SECONDS};
use crate::store::StoreError;

use super::availability::{build_occupied, OccupiedDateSet};
use super::conflict::first_conflict;
use super::{validate_range, Engine, EngineError};

/// Phases of one admission attempt.
///
/// `Received → Checking → Accepted | Rejected`, or `Aborted` from either of
/// the first two. `Aborted` is what an `Err` from the gate means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionPhase {
    Received,
    Checking,
    Accepted,
    Rejected,
    Aborted,
}

impl AdmissionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionPhase::Received => "received",
            AdmissionPhase::Checking => "checking",
            AdmissionPhase::Accepted => "accepted",
            AdmissionPhase::Rejected => "rejected",
            AdmissionPhase::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AdmissionPhase::Accepted | AdmissionPhase::Rejected | AdmissionPhase::Aborted
        )
    }
}

impl fmt::Display for AdmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed check. A rejection is a normal business outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No conflict; the reservation has been persisted.
    Accepted(Reservation),
    /// The candidate range hits an occupied day; nothing was written.
    Rejected { first_conflict: Day },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    pub fn phase(&self) -> AdmissionPhase {
        match self {
            Verdict::Accepted(_) => AdmissionPhase::Accepted,
            Verdict::Rejected { .. } => AdmissionPhase::Rejected,
        }
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            Verdict::Accepted(r) => Some(r),
            Verdict::Rejected { .. } => None,
        }
    }
}

/// Outcome of an all-or-nothing batch admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchVerdict {
    /// Every request was persisted, in request order.
    Accepted(Vec<Reservation>),
    /// `request_id` conflicts with stored state or an earlier request of the
    /// same batch. Nothing was written.
    Rejected { request_id: Ulid, first_conflict: Day },
}

impl BatchVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BatchVerdict::Accepted(_))
    }

    pub fn phase(&self) -> AdmissionPhase {
        match self {
            BatchVerdict::Accepted(_) => AdmissionPhase::Accepted,
            BatchVerdict::Rejected { .. } => AdmissionPhase::Rejected,
        }
    }
}

fn record_outcome(kind: &'static str, phase: AdmissionPhase, started: Instant) {
    metrics::counter!(ADMISSIONS_TOTAL, "kind" => kind, "outcome" => phase.as_str()).increment(1);
    metrics::histogram!(ADMISSION_DURATION_SECONDS, "kind" => kind)
        .record(started.elapsed().as_secs_f64());
}

/// Run the store write of an accepted admission to completion.
///
/// The write and the critical section guards move into their own task, so
/// dropping the caller's future after the verdict cannot interrupt the write
/// or release the section early.
async fn commit<G, T, F>(guards: G, write: F) -> Result<T, EngineError>
where
    G: Send + 'static,
    T: Send + 'static,
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let result = write.await;
        drop(guards);
        result
    });
    match task.await {
        Ok(result) => result.map_err(EngineError::from),
        Err(e) => Err(EngineError::PersistenceUnavailable(format!("commit task failed: {e}"))),
    }
}

impl Engine {
    /// Admission gate: accept and persist `request`, or reject it because its
    /// range overlaps a reservation counted by the admission filter.
    ///
    /// Range validation happens before any lock is taken. The reservation
    /// list is read fresh inside the critical section of the resource, and
    /// the section is held until the write has finished.
    pub async fn admit(&self, request: ReservationRequest) -> Result<Verdict, EngineError> {
        let started = Instant::now();
        let result = self.run_admission(request).await;
        let phase = match &result {
            Ok(verdict) => verdict.phase(),
            Err(_) => AdmissionPhase::Aborted,
        };
        record_outcome("single", phase, started);
        result
    }

    async fn run_admission(&self, request: ReservationRequest) -> Result<Verdict, EngineError> {
        let resource_id = request.resource_id;
        debug!(
            reservation_id = %request.id,
            resource_id = %resource_id,
            check_in = %request.check_in,
            check_out = %request.check_out,
            phase = %AdmissionPhase::Received,
        );
        validate_range(request.check_in, request.check_out)?;

        let guard = self.lock_resource(resource_id).await;
        debug!(reservation_id = %request.id, phase = %AdmissionPhase::Checking);
        let existing = match self.store.list_reservations(resource_id).await {
            Ok(existing) => existing,
            Err(StoreError::ResourceNotFound(id)) => {
                drop(guard);
                self.forget_lock(id);
                return Err(EngineError::ResourceNotFound(id));
            }
            Err(e) => return Err(e.into()),
        };

        let index = build_occupied(&existing, self.admission_filter)?;
        if let Some(day) = first_conflict(request.check_in, request.check_out, &index)? {
            debug!(reservation_id = %request.id, first_conflict = %day, phase = %AdmissionPhase::Rejected);
            return Ok(Verdict::Rejected { first_conflict: day });
        }

        let store = self.store.clone();
        let reservation = commit(guard, async move { store.create_reservation(&request).await }).await?;
        debug!(reservation_id = %reservation.id, phase = %AdmissionPhase::Accepted);
        Ok(Verdict::Accepted(reservation))
    }

    /// Admit several reservations atomically, on one or more resources.
    ///
    /// Every request is checked against stored state and against the earlier
    /// requests of the batch whose status counts under the admission filter.
    /// Either all of them are persisted or none is.
    pub async fn admit_batch(&self, requests: Vec<ReservationRequest>) -> Result<BatchVerdict, EngineError> {
        let started = Instant::now();
        let result = self.run_batch_admission(requests).await;
        let phase = match &result {
            Ok(verdict) => verdict.phase(),
            Err(_) => AdmissionPhase::Aborted,
        };
        record_outcome("batch", phase, started);
        result
    }

    async fn run_batch_admission(&self, requests: Vec<ReservationRequest>) -> Result<BatchVerdict, EngineError> {
        if requests.is_empty() {
            return Ok(BatchVerdict::Accepted(Vec::new()));
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("too many reservations in batch"));
        }
        let mut ids = HashSet::with_capacity(requests.len());
        for request in &requests {
            validate_range(request.check_in, request.check_out)?;
            if !ids.insert(request.id) {
                return Err(EngineError::AlreadyExists(request.id));
            }
        }

        let mut resource_ids: Vec<Ulid> = requests.iter().map(|r| r.resource_id).collect();
        resource_ids.sort_unstable();
        resource_ids.dedup();
        debug!(requests = requests.len(), resources = resource_ids.len(), phase = %AdmissionPhase::Received);

        let guards = self.lock_resources(&resource_ids).await;
        debug!(requests = requests.len(), phase = %AdmissionPhase::Checking);
        let mut indexes: HashMap<Ulid, OccupiedDateSet> = HashMap::with_capacity(resource_ids.len());
        for &resource_id in &resource_ids {
            let existing = match self.store.list_reservations(resource_id).await {
                Ok(existing) => existing,
                Err(StoreError::ResourceNotFound(id)) => {
                    drop(guards);
                    self.forget_lock(id);
                    return Err(EngineError::ResourceNotFound(id));
                }
                Err(e) => return Err(e.into()),
            };
            indexes.insert(resource_id, build_occupied(&existing, self.admission_filter)?);
        }

        for request in &requests {
            let index = indexes.entry(request.resource_id).or_default();
            if let Some(day) = first_conflict(request.check_in, request.check_out, index)? {
                debug!(reservation_id = %request.id, first_conflict = %day, phase = %AdmissionPhase::Rejected);
                return Ok(BatchVerdict::Rejected {
                    request_id: request.id,
                    first_conflict: day,
                });
            }
            if self.admission_filter.contains(request.status) {
                index.occupy(request.check_in, request.check_out)?;
            }
        }
        drop(indexes);

        let store = self.store.clone();
        let created = commit(guards, async move { store.create_reservations(&requests).await }).await?;
        debug!(reservations = created.len(), phase = %AdmissionPhase::Accepted);
        Ok(BatchVerdict::Accepted(created))
    }

    /// Move a reservation to `status`.
    ///
    /// A transition into the admission filter from outside it is checked
    /// against the other reservations of the resource first, under the same
    /// critical section as admission. Other transitions are applied as-is.
    /// Setting the current status again changes nothing.
    pub async fn update_status(&self, id: Ulid, status: ReservationStatus) -> Result<Verdict, EngineError> {
        let started = Instant::now();
        let result = self.run_status_change(id, status).await;
        let phase = match &result {
            Ok(verdict) => verdict.phase(),
            Err(_) => AdmissionPhase::Aborted,
        };
        record_outcome("status", phase, started);
        result
    }

    async fn run_status_change(&self, id: Ulid, status: ReservationStatus) -> Result<Verdict, EngineError> {
        // resource_id never changes, so it is safe to resolve outside the section.
        let resource_id = self.store.get_reservation(id).await?.resource_id;
        let guard = self.lock_resource(resource_id).await;

        let existing = self.store.list_reservations(resource_id).await?;
        let current = existing
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(EngineError::ReservationNotFound(id))?;
        if current.status == status {
            return Ok(Verdict::Accepted(current));
        }

        let filter = self.admission_filter;
        if filter.contains(status) && !filter.contains(current.status) {
            let others = build_occupied(existing.iter().filter(|r| r.id != id), filter)?;
            if let Some(day) = first_conflict(current.check_in, current.check_out, &others)? {
                debug!(reservation_id = %id, %status, first_conflict = %day, phase = %AdmissionPhase::Rejected);
                return Ok(Verdict::Rejected { first_conflict: day });
            }
        }

        let store = self.store.clone();
        let updated = commit(guard, async move { store.set_status(id, status).await }).await?;
        debug!(reservation_id = %id, from = %current.status, to = %status, phase = %AdmissionPhase::Accepted);
        Ok(Verdict::Accepted(updated))
    }

    /// Register a bookable resource.
    pub async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<Resource, EngineError> {
        let guard = self.lock_resource(id).await;
        let store = self.store.clone();
        let result = commit(guard, async move { store.create_resource(id, name).await }).await;
        if result.is_err() {
            self.forget_lock(id);
        }
        result
    }
}
