// pgbackup-tiers/src/backup/db_dump.rs
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use which::which;

use crate::config::{DatabaseConfig, DumpConfig};
use crate::errors::{BackupError, Result};

const PG_DUMP: &str = "pg_dump";

/// Runs `pg_dump` for one database and captures the SQL dump from stdout.
#[derive(Debug, Clone)]
pub struct DumpProducer {
    pg_dump_path: PathBuf,
    database: DatabaseConfig,
    dump: DumpConfig,
}

/// Finds pg_dump in the configured directories first, then in `PATH`.
fn find_pg_dump_executable(binary_dirs: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = binary_dirs
        .iter()
        .map(|dir| dir.join(PG_DUMP))
        .find(|candidate| candidate.is_file())
    {
        return Ok(path);
    }
    which(PG_DUMP).map_err(|e| {
        BackupError::Producer(format!(
            "pg_dump binary not found in {:?} or PATH: {e}",
            binary_dirs
        ))
    })
}

/// Prepends `dirs` to an existing search-path style variable.
fn prepend_search_path(dirs: &[PathBuf], existing: Option<OsString>) -> Result<OsString> {
    let existing_paths: Vec<PathBuf> = existing
        .as_deref()
        .map(|value| std::env::split_paths(value).collect())
        .unwrap_or_default();
    std::env::join_paths(dirs.iter().cloned().chain(existing_paths))
        .map_err(|e| BackupError::Configuration(format!("invalid search path entry: {e}")))
}

impl DumpProducer {
    pub fn locate(database: &DatabaseConfig, dump: &DumpConfig) -> Result<Self> {
        let pg_dump_path = find_pg_dump_executable(&dump.binary_dirs)?;
        info!(path = %pg_dump_path.display(), "using pg_dump");
        Ok(Self::with_executable(pg_dump_path, database, dump))
    }

    pub fn with_executable(pg_dump_path: PathBuf, database: &DatabaseConfig, dump: &DumpConfig) -> Self {
        Self {
            pg_dump_path,
            database: database.clone(),
            dump: dump.clone(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.pg_dump_path
    }

    /// Command-line arguments, excluding the password (passed via `PGPASSWORD`).
    pub fn command_args(&self) -> Vec<String> {
        let mut args = vec![
            "-h".to_string(),
            self.database.host.clone(),
            "-p".to_string(),
            self.database.port.to_string(),
            "-U".to_string(),
            self.database.user.clone(),
            "-d".to_string(),
            self.database.database.clone(),
            "--verbose".to_string(),
            "--no-owner".to_string(),
            "--no-privileges".to_string(),
            "--clean".to_string(),
            "--if-exists".to_string(),
            "--no-comments".to_string(),
        ];
        args.extend(
            self.dump
                .exclude_schemas
                .iter()
                .map(|schema| format!("--exclude-schema={schema}")),
        );
        args.extend(self.dump.extra_args.iter().cloned());
        args
    }

    /// Runs pg_dump to completion. The child is killed if this future is dropped.
    pub async fn produce(&self) -> Result<Vec<u8>> {
        let path = prepend_search_path(&self.dump.binary_dirs, std::env::var_os("PATH"))?;
        let library_path =
            prepend_search_path(&self.dump.library_dirs, std::env::var_os("LD_LIBRARY_PATH"))?;

        info!(
            host = %self.database.host,
            port = self.database.port,
            database = %self.database.database,
            "executing pg_dump"
        );
        let output = Command::new(&self.pg_dump_path)
            .args(self.command_args())
            .env("PGPASSWORD", &self.database.password)
            .env("PATH", path)
            .env("LD_LIBRARY_PATH", library_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BackupError::Producer(format!(
                    "failed to execute {}: {e}",
                    self.pg_dump_path.display()
                ))
            })?;

        // pg_dump writes its progress to stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "pg_dump stderr");
        }

        if !output.status.success() {
            return Err(BackupError::Producer(format!(
                "pg_dump failed with {}\nstderr: {}",
                output.status, stderr
            )));
        }
        if output.stdout.is_empty() {
            return Err(BackupError::Producer(
                "pg_dump exited successfully but produced no output".to_string(),
            ));
        }

        info!(bytes = output.stdout.len(), "dump created");
        Ok(output.stdout)
    }
}
