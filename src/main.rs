//! Scheduled PostgreSQL backup into tiered S3 storage
//!
//! One invocation dumps the database, skips the upload when nothing changed
//! since the last daily backup, fills the daily/monthly/yearly tiers and
//! prunes expired daily backups.

// pgbackup-tiers/src/main.rs
mod backup;
mod config;
mod errors;
mod storage;
mod utils;

use anyhow::{Context, Result};
use backup::RunOutcome;
use backup::rotation::RetentionTier;
use config::AppConfig;
use std::process::ExitCode;
use storage::s3::S3ArtifactStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entry point for the backup job
#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file for local development
    let _ = dotenv::dotenv();
    init_tracing();

    match run_app().await {
        Ok(_) => {
            info!("✅ Backup process completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run_app() -> Result<()> {
    let app_config = AppConfig::load().context("Failed to load backup configuration")?;
    info!(
        bucket = %app_config.storage.bucket_name,
        host = %app_config.database.host,
        database = %app_config.database.database,
        "🚀 Starting database backup..."
    );

    let store = S3ArtifactStore::connect(&app_config.storage).await;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let outcome = backup::run_backup_flow(&app_config, &store, &cancel)
        .await
        .context("Backup process failed")?;
    report(&outcome);
    Ok(())
}

/// Cancels the run on Ctrl-C, or SIGTERM where available.
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("shutdown signal received, cancelling backup run");
    cancel.cancel();
}

fn report(outcome: &RunOutcome) {
    if outcome.skipped {
        info!(fingerprint = %outcome.fingerprint, "content unchanged, no backups written");
    }
    for tier in RetentionTier::ALL {
        info!(%tier, written = outcome.wrote(tier), "tier summary");
    }
    for written in &outcome.written {
        info!(tier = %written.tier, key = %written.key, "written");
    }
    if outcome.pruning_ran {
        info!(count = outcome.pruned.len(), keys = ?outcome.pruned, "pruned old daily backups");
    }
    for warning in &outcome.warnings {
        warn!("⚠️ {warning}");
    }
}
