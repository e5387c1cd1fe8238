//! service
//!
//! Startup hydration and the running service.
//!
//! # Lifecycle
//!
//! 1. [`hydrate`] opens the storage directory and loads the newest complete
//!    image into a fresh registry, before any request is served.
//! 2. [`run`] serves HTTP and flushes in the background until the shutdown
//!    token is cancelled.
//! 3. On shutdown the HTTP front stops first, then the flusher performs its
//!    final flush, so the last image includes every accepted sign-in.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::core::registry::Registry;
use crate::persist::{FlushReport, Flusher, PersistError, PersistenceEngine, RecoveryPolicy};
use crate::server::{AppState, HttpServer};

/// Open `storage_dir` and rebuild the registry from its newest image.
///
/// # Errors
///
/// Any error here is fatal to startup: an unusable or locked directory, or
/// a corrupt image that `recovery` does not allow skipping.
pub fn hydrate(
    storage_dir: impl Into<std::path::PathBuf>,
    recovery: RecoveryPolicy,
) -> Result<(PersistenceEngine, Registry), PersistError> {
    let engine = PersistenceEngine::open(storage_dir)?.with_recovery(recovery);
    let snapshot = engine.load_latest()?;
    info!(
        dir = %engine.root().display(),
        guests = snapshot.len(),
        "registry hydrated"
    );
    Ok((engine, Registry::from_snapshot(snapshot)))
}

/// Serve and flush until `shutdown` is cancelled.
pub async fn run(
    engine: Arc<PersistenceEngine>,
    registry: Arc<Registry>,
    server: HttpServer,
    flush_interval: Duration,
    shutdown: CancellationToken,
) -> FlushReport {
    let http_token = shutdown.child_token();
    let flush_token = CancellationToken::new();

    let flusher =
        Flusher::new(Arc::clone(&registry), engine, flush_interval).spawn(flush_token.clone());
    let state = Arc::new(AppState::new(registry));
    let http = tokio::spawn(server.run(state, http_token));

    shutdown.cancelled().await;

    if let Err(e) = http.await {
        error!(error = %e, "http front ended abnormally");
    }
    flush_token.cancel();

    let report = match flusher.await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "flusher ended abnormally");
            FlushReport {
                succeeded: 0,
                failed: 0,
                final_flush: Err(PersistError::TaskFailed(e.to_string())),
            }
        }
    };

    match &report.final_flush {
        Ok(id) => info!(
            image = %id,
            periodic = report.succeeded,
            failed = report.failed,
            "guestbook stopped"
        ),
        Err(err) => error!(error = %err, "final flush failed, latest sign-ins may be lost"),
    }
    report
}
