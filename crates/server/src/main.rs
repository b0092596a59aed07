mod bootstrap;
mod error;
mod health;
mod middleware;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use leaveflow_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;

use crate::health::HealthState;
use crate::routes::AppState;

fn init_logging(config: &AppConfig) {
    use leaveflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = app.config.listen_address();
    let request_timeout = Duration::from_secs(app.config.server.request_timeout_secs);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let router = routes::router(
        AppState { employees: app.employees.clone(), leaves: app.leaves.clone() },
        HealthState::new(app.db_pool.clone(), app.cache.clone()),
        request_timeout,
    );
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "leaveflow-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.notified().await })
            .await
    });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "leaveflow-server draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish within the grace period"
        ),
    }
    app.db_pool.close().await;

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "leaveflow-server stopped"
    );
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
