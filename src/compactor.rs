use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends have piled up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}

/// One compactor pass. Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        debug!("compactor: {appends} appends, below threshold {threshold}");
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            error!("WAL compaction failed: {e}");
            false
        }
    }
}
