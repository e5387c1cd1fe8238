//! serve command - Run the HTTP service until Ctrl-C

use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Context;
use crate::server::HttpServer;
use crate::service;

/// Hydrate, serve, and flush once more on Ctrl-C.
///
/// Startup is fatal if the storage directory is unusable or the newest image
/// cannot be loaded under the configured recovery policy.
pub fn serve(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let storage_dir = config.storage_dir();

    let (engine, registry) = service::hydrate(&storage_dir, config.recovery())
        .with_context(|| format!("failed to open storage at {}", storage_dir.display()))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = runtime.block_on(async {
        let server = HttpServer::bind(config.listen())?;
        info!(
            addr = %server.local_addr(),
            flush_interval_secs = config.flush_interval().as_secs(),
            "guestbook listening"
        );

        let shutdown = CancellationToken::new();
        let service = tokio::spawn(service::run(
            Arc::new(engine),
            Arc::new(registry),
            server,
            config.flush_interval(),
            shutdown.clone(),
        ));

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("Ctrl-C received, shutting down");
        shutdown.cancel();

        service.await.context("service task failed")
    })?;

    if let Err(err) = report.final_flush {
        bail!("final flush failed: {err}");
    }
    Ok(())
}
