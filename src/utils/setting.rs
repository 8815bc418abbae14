// Preflight checks run before the dump producer is spawned
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::DatabaseConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn connect_options(db: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .username(&db.user)
        .password(&db.password)
        .database(&db.database)
}

/// Opens one connection and runs `SELECT 1`. Returns whether the database answered.
pub async fn check_db_connection(db: &DatabaseConfig) -> bool {
    let probe = async {
        let mut conn = PgConnection::connect_with(&connect_options(db)).await?;
        sqlx::query("SELECT 1").execute(&mut conn).await?;
        conn.close().await?;
        Ok::<(), sqlx::Error>(())
    };

    match timeout(CONNECT_TIMEOUT, probe).await {
        Ok(Ok(())) => {
            info!(host = %db.host, database = %db.database, "✅ database connection check passed");
            true
        }
        Ok(Err(e)) => {
            error!(host = %db.host, database = %db.database, error = %e, "❌ database connection check failed");
            false
        }
        Err(_) => {
            error!(
                host = %db.host,
                database = %db.database,
                "❌ database connection check timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            );
            false
        }
    }
}
