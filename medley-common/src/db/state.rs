//! Persisted key/value state
//!
//! Generic `DBState` accessors. Sync checkpoints live here under
//! `syncResumeData_<provider>`; they are written through the cache layer so
//! a checkpoint always commits together with the batch it describes.

use crate::cache::{self, StateUpdates};
use crate::db::transaction::SqlTransaction;
use crate::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::collections::BTreeMap;

const SYNC_RESUME_PREFIX: &str = "syncResumeData_";

/// State key holding `provider`'s sync checkpoint
pub fn sync_resume_key(provider: &str) -> String {
    format!("{}{}", SYNC_RESUME_PREFIX, provider)
}

/// Provider name of a checkpoint key, if `key` is one
pub fn provider_of_resume_key(key: &str) -> Option<&str> {
    key.strip_prefix(SYNC_RESUME_PREFIX)
}

/// Value stored under `key`, or `default` when absent or NULL
pub async fn get_state_value(db: &Pool<Sqlite>, key: &str, default: Option<&str>) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT stateValue FROM DBState WHERE stateKey = ?")
            .bind(key)
            .fetch_optional(db)
            .await
            .map_err(Error::Database)?;

    Ok(row
        .and_then(|(value,)| value)
        .or_else(|| default.map(str::to_string)))
}

/// Values for `keys`; missing keys are omitted from the result
pub async fn get_state(db: &Pool<Sqlite>, keys: &[String]) -> Result<BTreeMap<String, Option<String>>> {
    let mut values = BTreeMap::new();
    for key in keys {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT stateValue FROM DBState WHERE stateKey = ?")
                .bind(key)
                .fetch_optional(db)
                .await
                .map_err(Error::Database)?;
        if let Some((value,)) = row {
            values.insert(key.clone(), value);
        }
    }
    Ok(values)
}

/// Every stored sync checkpoint, keyed by provider name
pub async fn list_sync_checkpoints(db: &Pool<Sqlite>) -> Result<BTreeMap<String, Option<String>>> {
    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT stateKey, stateValue FROM DBState WHERE stateKey LIKE ? ORDER BY stateKey")
            .bind(format!("{}%", SYNC_RESUME_PREFIX))
            .fetch_all(db)
            .await
            .map_err(Error::Database)?;

    Ok(rows
        .into_iter()
        .filter_map(|(key, value)| provider_of_resume_key(&key).map(|p| (p.to_string(), value)))
        .collect())
}

/// Write `updates` in one transaction
pub async fn set_state(db: &Pool<Sqlite>, updates: &StateUpdates) -> Result<()> {
    let mut tx = SqlTransaction::new();
    cache::write_state(&mut tx, updates);
    tx.execute(db).await?;
    Ok(())
}

/// Remove `key` entirely
pub async fn delete_state(db: &Pool<Sqlite>, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM DBState WHERE stateKey = ?")
        .bind(key)
        .execute(db)
        .await
        .map_err(Error::Database)?;
    Ok(result.rows_affected() > 0)
}
