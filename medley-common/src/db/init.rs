//! Database initialization
//!
//! Creates the cache database on first run and opens it on later runs.
//! Schema creation is idempotent.

use crate::db::schema;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path, busy_timeout: Duration) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| Error::Config(format!("Invalid database path {}: {}", db_path.display(), e)))?
        .create_if_missing(true)
        // WAL allows concurrent readers with one writer
        .journal_mode(SqliteJournalMode::Wal)
        // Parent/child consistency is the write layer's job
        .foreign_keys(false)
        .busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;

    info!("Database busy timeout set to {} ms", busy_timeout.as_millis());

    Ok(pool)
}

/// Create every cache table that does not exist yet
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    for statement in schema::CREATE_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(tables = schema::ALL_TABLES.len(), "Cache tables ensured");
    Ok(())
}

/// Drop every cache table, then recreate the empty schema
pub async fn purge_database(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in schema::DROP_TABLES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    create_tables(pool).await?;
    info!("Cache database purged");
    Ok(())
}
