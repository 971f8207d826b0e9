use std::io;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability::{WAL_FLUSH_BATCH_SIZE, WAL_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

use super::memory::InMemoryStore;
use super::{now_ms, ReservationStore, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Vec<Event>, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain all immediately available Appends (the batch window).
/// 3. Single flush_sync for the whole batch, then answer every sender.
/// A non-append command ends the window and runs after the flush.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { events, response } => {
                let mut batch = vec![(events, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { events, response }) => batch.push((events, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel drained, flush
                    }
                }
                commit_batch(&mut wal, batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    let count: usize = batch.iter().map(|(events, _)| events.len()).sum();
    metrics::histogram!(WAL_FLUSH_BATCH_SIZE).record(count as f64);
    let flush_start = Instant::now();
    let result = flush_batch(wal, &batch);
    metrics::histogram!(WAL_FLUSH_DURATION_SECONDS).record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        error!(path = %wal.path().display(), "WAL flush failed: {e}");
    }
    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    'batch: for (events, _) in batch {
        for event in events {
            if let Err(e) = wal.append_buffered(event) {
                append_err = Some(e);
                break 'batch;
            }
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.compact(&events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

fn writer_gone() -> StoreError {
    StoreError::Unavailable("WAL writer shut down".into())
}

/// Reservation store backed by a write-ahead log.
///
/// Every mutation is appended and fsynced before it becomes visible in
/// memory. Reads never touch the disk.
pub struct DurableStore {
    state: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Shared across append + apply by mutations, exclusive for compaction,
    /// so a snapshot can never miss an event that reached the log.
    compaction: RwLock<()>,
}

impl DurableStore {
    /// Replay the log at `path` and start its writer task. Must be called
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let replay = Wal::replay(path)?;
        let state = InMemoryStore::new();
        for event in &replay.events {
            state.apply_event(event);
        }

        let mut wal = Wal::open(path)?;
        if replay.truncated {
            // Appending after a damaged tail would hide every later record.
            warn!(path = %path.display(), "discarding damaged WAL tail");
            wal.compact(&state.snapshot())?;
        }
        info!(
            path = %path.display(),
            resources = state.resource_count(),
            reservations = state.reservation_count(),
            "store opened"
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            state,
            wal_tx,
            compaction: RwLock::new(()),
        })
    }

    /// Log, then apply. Caller holds the shared compaction guard.
    async fn persist(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                events: events.clone(),
                response: tx,
            })
            .await
            .map_err(|_| writer_gone())?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        for event in &events {
            self.state.apply_event(event);
        }
        Ok(())
    }

    /// Rewrite the log as a snapshot of the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _exclusive = self.compaction.write().await;
        let events = self.state.snapshot();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| writer_gone())?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl ReservationStore for DurableStore {
    async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<Resource, StoreError> {
        let _shared = self.compaction.read().await;
        let event = self.state.plan_create_resource(id, name)?;
        self.persist(vec![event]).await?;
        self.state.resource(id)
    }

    async fn get_resource(&self, id: Ulid) -> Result<Resource, StoreError> {
        self.state.resource(id)
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        Ok(self.state.resources())
    }

    async fn list_reservations(&self, resource_id: Ulid) -> Result<Vec<Reservation>, StoreError> {
        self.state.reservations_of(resource_id)
    }

    async fn get_reservation(&self, id: Ulid) -> Result<Reservation, StoreError> {
        self.state.reservation(id)
    }

    async fn create_reservation(&self, request: &ReservationRequest) -> Result<Reservation, StoreError> {
        let mut created = self.create_reservations(std::slice::from_ref(request)).await?;
        created.pop().ok_or(StoreError::ReservationNotFound(request.id))
    }

    async fn create_reservations(&self, requests: &[ReservationRequest]) -> Result<Vec<Reservation>, StoreError> {
        let _shared = self.compaction.read().await;
        let (events, claim) = self.state.plan_create_reservations(requests, now_ms())?;
        self.persist(events).await?;
        drop(claim);
        self.state.created_rows(requests)
    }

    async fn set_status(&self, id: Ulid, status: ReservationStatus) -> Result<Reservation, StoreError> {
        let _shared = self.compaction.read().await;
        let event = self.state.plan_set_status(id, status)?;
        self.persist(vec![event]).await?;
        self.state.reservation(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("vacancy_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn day(m: u32, d: u32) -> Day {
        Day::from_ymd_opt(2024, m, d).unwrap()
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let path = test_wal_path("reopen.wal");
        let rid = Ulid::new();
        let req = ReservationRequest::new(rid, day(3, 1), day(3, 5)).with_status(ReservationStatus::Requested);
        {
            let store = DurableStore::open(&path).unwrap();
            store.create_resource(rid, Some("Chalet".into())).await.unwrap();
            store.create_reservation(&req).await.unwrap();
            store.set_status(req.id, ReservationStatus::Confirmed).await.unwrap();
        }

        let store = DurableStore::open(&path).unwrap();
        assert_eq!(store.get_resource(rid).await.unwrap().name.as_deref(), Some("Chalet"));
        let listed = store.list_reservations(rid).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, req.id);
        assert_eq!(listed[0].status, ReservationStatus::Confirmed);
        assert_eq!(listed[0].check_out, day(3, 5));
    }

    #[tokio::test]
    async fn failed_validation_writes_nothing() {
        let path = test_wal_path("validation.wal");
        let store = DurableStore::open(&path).unwrap();
        let orphan = ReservationRequest::new(Ulid::new(), day(1, 1), day(1, 2));
        assert!(matches!(
            store.create_reservation(&orphan).await,
            Err(StoreError::ResourceNotFound(_))
        ));
        assert_eq!(store.appends_since_compact().await, 0);
    }

    #[tokio::test]
    async fn compact_preserves_state_and_resets_counter() {
        let path = test_wal_path("compact_store.wal");
        let rid = Ulid::new();
        {
            let store = DurableStore::open(&path).unwrap();
            store.create_resource(rid, None).await.unwrap();
            for d in 1..=10 {
                let req = ReservationRequest::new(rid, day(5, d), day(5, d))
                    .with_status(ReservationStatus::Requested);
                store.create_reservation(&req).await.unwrap();
                store.set_status(req.id, ReservationStatus::Cancelled).await.unwrap();
            }
            assert_eq!(store.appends_since_compact().await, 21);
            store.compact().await.unwrap();
            assert_eq!(store.appends_since_compact().await, 0);
        }

        let store = DurableStore::open(&path).unwrap();
        let listed = store.list_reservations(rid).await.unwrap();
        assert_eq!(listed.len(), 10);
        assert!(listed.iter().all(|r| r.status == ReservationStatus::Cancelled));
    }

    #[tokio::test]
    async fn damaged_tail_is_rewritten_on_open() {
        use std::io::Write;

        let path = test_wal_path("damaged_tail.wal");
        let rid = Ulid::new();
        {
            let store = DurableStore::open(&path).unwrap();
            store.create_resource(rid, None).await.unwrap();
        }
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[1, 2, 3]).unwrap();
        }
        let late = ReservationRequest::new(rid, day(9, 1), day(9, 2));
        {
            let store = DurableStore::open(&path).unwrap();
            store.create_reservation(&late).await.unwrap();
        }
        let store = DurableStore::open(&path).unwrap();
        assert_eq!(store.get_reservation(late.id).await.unwrap().resource_id, rid);
    }
}
