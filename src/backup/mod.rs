pub(crate) mod db_dump; // pg_dump shell-out
pub(crate) mod dedup;
pub(crate) mod fingerprint;
mod logic;
pub(crate) mod pruner;
pub(crate) mod rotation;

use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::{BackupError, Result};
use crate::storage::ArtifactStore;
use crate::utils::setting::check_db_connection;
use self::db_dump::DumpProducer;

pub use logic::{BackupOrchestrator, RunOutcome};

/// Public entry point for one backup run: preflight, dump, then the
/// artifact lifecycle against `store`.
///
/// The whole run is bounded by `app_config.run_timeout` and aborts as soon
/// as `cancel` fires.
pub async fn run_backup_flow<S: ArtifactStore + ?Sized>(
    app_config: &AppConfig,
    store: &S,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    let flow = async {
        if app_config.preflight_check && !check_db_connection(&app_config.database).await {
            return Err(BackupError::Producer(
                "cannot proceed with backup - database connection failed".to_string(),
            ));
        }

        let producer = DumpProducer::locate(&app_config.database, &app_config.dump)?;
        debug!(executable = %producer.executable().display(), args = ?producer.command_args(), "dump producer ready");
        let dump = producer.produce().await?;

        let today = Utc::now().date_naive();
        BackupOrchestrator::new(store, &app_config.retention)
            .run(&dump, today)
            .await
    };

    with_deadline(flow, app_config.run_timeout, cancel).await
}

/// Drives `fut` until it completes, `deadline` elapses or `cancel` fires.
/// Dropping the inner future aborts in-flight requests and kills pg_dump.
pub async fn with_deadline<F, T>(fut: F, deadline: Duration, cancel: &CancellationToken) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackupError::Cancelled("backup run interrupted".to_string())),
        result = tokio::time::timeout(deadline, fut) => {
            result.unwrap_or_else(|_| Err(BackupError::TimedOut(deadline.as_secs())))
        }
    }
}
