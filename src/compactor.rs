use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::store::{DurableStore, StoreError};

/// Background task that rewrites the WAL once enough appends have piled up.
pub async fn run_compactor(store: Arc<DurableStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&store, threshold).await {
            error!("WAL compaction failed: {e}");
        }
    }
}

/// Compact when at least `threshold` appends happened since the last
/// compaction. Returns whether a compaction ran.
pub async fn compact_if_needed(store: &DurableStore, threshold: u64) -> Result<bool, StoreError> {
    let appends = store.appends_since_compact().await;
    if appends < threshold.max(1) {
        return Ok(false);
    }
    store.compact().await?;
    info!(appends, "compacted WAL");
    Ok(true)
}
