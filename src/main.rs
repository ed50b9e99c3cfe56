// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use recipe_sync::api::HttpServer;
use recipe_sync::logging::setup_logging;
use recipe_sync::{App, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level)?;

    info!("Starting recipe-sync v{}", env!("CARGO_PKG_VERSION"));

    let app = App::build(&config).await?;

    // Start HTTP server
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let http_server = HttpServer::new(Arc::new(app.api_handlers()), config.local_api_bind);
    let http_task = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = http_server.serve(shutdown).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("All services started. Waiting for shutdown signal...");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    info!("Initiating graceful shutdown...");

    let _ = shutdown_tx.send(());
    if let Err(e) = http_task.await {
        error!(error = %e, "HTTP server task failed");
    }

    // Let queued background work drain
    let background_worker = app.shutdown();
    if tokio::time::timeout(tokio::time::Duration::from_secs(2), background_worker)
        .await
        .is_err()
    {
        info!("Background queue did not drain in time");
    }

    info!("Shutdown complete");
    Ok(())
}
