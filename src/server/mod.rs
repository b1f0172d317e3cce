//! HTTP relay between web clients and the agent.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

use crate::utils::error::Result;
use std::time::Duration;

pub use error::{AppError, AppResult};
pub use router::build_app_router;
pub use state::AppState;

/// Finished jobs are checked for expiry this often, at most.
const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Bind, serve until SIGINT/SIGTERM, and expire old jobs in the background.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.settings.bind_address();
    let app = build_app_router(state.clone())?;

    let purge = tokio::spawn(purge_expired_jobs(state.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Relay server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

async fn purge_expired_jobs(state: AppState) {
    let retention = state.settings.job_retention();
    let mut ticker = tokio::time::interval(retention.min(MAX_PURGE_INTERVAL).max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let removed = state.jobs.purge_finished_older_than(retention).await;
        if removed > 0 {
            tracing::info!(removed, "Purged expired jobs");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
