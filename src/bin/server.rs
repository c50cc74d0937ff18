//! Auditflow service entry point: configuration, logging, migrations, the
//! periodic reconciliation sweep, and the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use auditflow_core::config::AuditflowConfig;
use auditflow_core::directory::PgDirectory;
use auditflow_core::logging::init_structured_logging;
use auditflow_core::monitor::OverdueMonitor;
use auditflow_core::storage::LocalDiskStore;
use auditflow_core::web::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = AuditflowConfig::from_env().context("loading configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let documents = Arc::new(LocalDiskStore::new(
        &config.document_root,
        &config.document_public_base,
    ));

    let state = AppState::new(pool, config.clone(), directory, documents);

    let rule_count = state.engine.refresh_rules().await?;
    info!(rule_count, "automation rules loaded");

    spawn_sweep(state.clone(), config.sweep_interval_secs);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!(address = %config.bind_address, "auditflow listening");

    axum::serve(listener, create_app(state)).await?;

    Ok(())
}

/// Periodic reconciliation: refresh the rule cache, run the time-based rule
/// pass, and report the derived overdue set. Item failures are logged by the
/// components; a failed tick never kills the loop.
fn spawn_sweep(state: AppState, interval_secs: u64) {
    let monitor = OverdueMonitor::new(state.pool.clone());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(error) = state.engine.refresh_rules().await {
                warn!(%error, "rule refresh failed; keeping previous rule set");
            }

            match state.engine.sweep().await {
                Ok(flags) if !flags.is_empty() => {
                    info!(flagged = flags.len(), "time-based rules flagged overdue steps");
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "automation sweep failed"),
            }

            match monitor.scan_overdue(Utc::now()).await {
                Ok(overdue) if !overdue.is_empty() => {
                    info!(overdue = overdue.len(), "overdue steps detected");
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "overdue scan failed"),
            }
        }
    });
}
