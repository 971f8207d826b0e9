mod admission;
mod availability;
mod conflict;
mod error;
mod expander;
mod queries;

pub use admission::{AdmissionPhase, BatchVerdict, Verdict};
pub use availability::{build_occupied, is_occupied, OccupiedDateSet};
pub use conflict::{first_conflict, has_conflict};
pub use error::{EngineError, RangeError};
pub use expander::{expand, DayRange};
pub(crate) use expander::validate_range;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::model::StatusFilter;
use crate::observability::ADMISSION_LOCK_WAIT_SECONDS;
use crate::store::ReservationStore;

type ResourceLock = Arc<Mutex<()>>;

/// Availability engine over one reservation store.
///
/// Reads go straight to the store. Anything that can change occupancy runs
/// inside the per-resource critical section, so two attempts on the same
/// resource never interleave while attempts on different resources never
/// wait on each other.
pub struct Engine {
    store: Arc<dyn ReservationStore>,
    /// Resource id → critical section. Entries are created on first use.
    locks: DashMap<Ulid, ResourceLock>,
    /// Statuses that block a calendar during admission and availability checks.
    admission_filter: StatusFilter,
}

impl Engine {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            admission_filter: StatusFilter::default(),
        }
    }

    /// Replace which statuses block admission (default `{confirmed}`).
    pub fn with_admission_filter(mut self, filter: StatusFilter) -> Self {
        self.admission_filter = filter;
        self
    }

    pub fn admission_filter(&self) -> StatusFilter {
        self.admission_filter
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    /// Enter the critical section of `resource_id`.
    ///
    /// The lock table shard guard is released before awaiting the mutex.
    pub(super) async fn lock_resource(&self, resource_id: Ulid) -> OwnedMutexGuard<()> {
        let slot = self.locks.entry(resource_id).or_default().value().clone();
        let wait_start = Instant::now();
        let guard = slot.lock_owned().await;
        metrics::histogram!(ADMISSION_LOCK_WAIT_SECONDS).record(wait_start.elapsed().as_secs_f64());
        guard
    }

    /// Lock several resources. `resource_ids` must be sorted and deduplicated;
    /// acquiring in one global order keeps overlapping batches deadlock free.
    pub(super) async fn lock_resources(&self, resource_ids: &[Ulid]) -> Vec<OwnedMutexGuard<()>> {
        debug_assert!(resource_ids.windows(2).all(|w| w[0] < w[1]));
        let mut guards = Vec::with_capacity(resource_ids.len());
        for &id in resource_ids {
            guards.push(self.lock_resource(id).await);
        }
        guards
    }

    /// Drop the lock slot of a resource the store does not know, unless somebody
    /// else is holding or waiting on it. Keeps lookups of bogus ids from
    /// growing the table. Call only after releasing your own guard.
    pub(super) fn forget_lock(&self, resource_id: Ulid) {
        self.locks
            .remove_if(&resource_id, |_, slot| Arc::strong_count(slot) == 1);
    }

    #[cfg(test)]
    pub(super) fn lock_table_len(&self) -> usize {
        self.locks.len()
    }
}
