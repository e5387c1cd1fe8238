//! persist::flusher
//!
//! Background task that flushes registry snapshots on a fixed interval.
//!
//! # Lifecycle
//!
//! - Waits for the next tick or for cancellation, whichever comes first.
//! - On a tick: snapshot the registry (brief read lock), then persist on the
//!   blocking pool. File I/O never runs under the registry lock.
//! - On cancellation: one final snapshot + persist, then return.
//!
//! Failed flushes are logged and left for the next tick. A failed final
//! flush is logged and the task still ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{ImageId, PersistError, SnapshotStore};
use crate::core::registry::Registry;

/// Outcome of one flush attempt.
pub type FlushResult = Result<ImageId, PersistError>;

/// Summary returned when the flusher stops.
#[derive(Debug)]
pub struct FlushReport {
    /// Periodic flushes that committed an image.
    pub succeeded: usize,
    /// Periodic flushes that failed.
    pub failed: usize,
    /// Result of the flush performed on shutdown.
    pub final_flush: FlushResult,
}

/// Periodic snapshot writer.
pub struct Flusher {
    registry: Arc<Registry>,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
}

impl Flusher {
    /// Create a flusher. `interval` must be non-zero.
    pub fn new(registry: Arc<Registry>, store: Arc<dyn SnapshotStore>, interval: Duration) -> Self {
        Self {
            registry,
            store,
            interval,
        }
    }

    /// Snapshot the registry and persist it once.
    pub async fn flush_once(&self) -> FlushResult {
        let snapshot = self.registry.snapshot();
        let guests = snapshot.len();
        let store = Arc::clone(&self.store);

        let result = tokio::task::spawn_blocking(move || store.persist(&snapshot))
            .await
            .unwrap_or_else(|join_err| Err(PersistError::TaskFailed(join_err.to_string())));

        match &result {
            Ok(id) => info!(image = %id, guests, "persisted guests"),
            Err(err) => error!(error = %err, guests, "failed to persist guests"),
        }
        result
    }

    /// Run until `token` is cancelled, then flush one last time.
    pub async fn run(self, token: CancellationToken) -> FlushReport {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the registry was just loaded.
        ticker.tick().await;

        let mut succeeded = 0;
        let mut failed = 0;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    debug!("flush interval elapsed");
                    match self.flush_once().await {
                        Ok(_) => succeeded += 1,
                        Err(_) => failed += 1,
                    }
                }
            }
        }

        info!("shutdown requested, flushing guests one last time");
        let final_flush = self.flush_once().await;
        FlushReport {
            succeeded,
            failed,
            final_flush,
        }
    }

    /// Spawn [`Flusher::run`] on the current runtime.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<FlushReport> {
        tokio::spawn(self.run(token))
    }
}
