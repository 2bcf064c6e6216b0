//! Media cache database handle
//!
//! `MediaDatabase` owns the connection pool and exposes every cache write,
//! read and state operation. Each write call runs as one transaction; the
//! `db_state` entries of [`CacheOptions`] commit together with the records.

use crate::cache::{self, CacheOptions, SavedTable, StateUpdates};
use crate::config::{database_path, SyncSettings};
use crate::db::transaction::SqlTransaction;
use crate::db::{init, queries, state};
use crate::media::{Artist, IndexRange, LibraryItem, Track, TrackCollection};
use crate::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MediaDatabase {
    pool: SqlitePool,
    commit_busy_max_wait: Duration,
}

impl MediaDatabase {
    /// Open (creating if needed) `<root_folder>/medley.db`
    pub async fn initialize(root_folder: &Path, settings: &SyncSettings) -> Result<Self> {
        Self::open(&database_path(root_folder), settings).await
    }

    /// Open the database file at `db_path`
    pub async fn open(db_path: &Path, settings: &SyncSettings) -> Result<Self> {
        let pool = init::init_database(db_path, settings.busy_timeout()).await?;
        Ok(Self::from_pool(pool, settings))
    }

    pub fn from_pool(pool: SqlitePool, settings: &SyncSettings) -> Self {
        Self {
            pool,
            commit_busy_max_wait: settings.commit_busy_max_wait(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Empty transaction configured for this database
    pub fn transaction(&self) -> SqlTransaction {
        SqlTransaction::new().with_commit_busy_max_wait(self.commit_busy_max_wait)
    }

    /// Drop and recreate every cache table
    pub async fn reset(&self) -> Result<()> {
        init::purge_database(&self.pool).await
    }

    async fn commit(&self, mut tx: SqlTransaction, options: &CacheOptions) -> Result<()> {
        if !options.db_state.is_empty() {
            cache::write_state(&mut tx, &options.db_state);
        }
        if tx.is_empty() {
            return Ok(());
        }
        let statements = tx.len();
        tx.execute(&self.pool).await?;
        debug!(statements, "Cache batch committed");
        Ok(())
    }

    // ========================================================================
    // Cache writes
    // ========================================================================

    pub async fn cache_artists(&self, artists: &[Artist], options: &CacheOptions) -> Result<()> {
        let mut tx = self.transaction();
        cache::write_artists(&mut tx, artists);
        self.commit(tx, options).await
    }

    pub async fn cache_tracks(&self, tracks: &[Track], options: &CacheOptions) -> Result<()> {
        let mut tx = self.transaction();
        cache::write_tracks(&mut tx, tracks);
        self.commit(tx, options).await
    }

    pub async fn cache_track_collections(
        &self,
        collections: &[TrackCollection],
        options: &CacheOptions,
    ) -> Result<()> {
        let mut tx = self.transaction();
        cache::write_track_collections(&mut tx, collections);
        self.commit(tx, options).await
    }

    /// Refresh the stored items of `collection` within `range`
    pub async fn cache_track_collection_items(
        &self,
        collection: &TrackCollection,
        range: IndexRange,
        options: &CacheOptions,
    ) -> Result<()> {
        let mut tx = self.transaction();
        cache::write_track_collection_items(&mut tx, collection, range);
        self.commit(tx, options).await
    }

    /// Library items, saved rows and `options.db_state` in one transaction
    pub async fn cache_library_items(&self, items: &[LibraryItem], options: &CacheOptions) -> Result<()> {
        let mut tx = self.transaction();
        cache::write_library_items(&mut tx, items, options);
        let statements = tx.len();
        tx.execute(&self.pool).await?;
        debug!(items = items.len(), statements, "Library items cached");
        Ok(())
    }

    // ========================================================================
    // Library membership
    // ========================================================================

    pub async fn unsave_tracks(&self, provider: &str, uris: &[String]) -> Result<()> {
        self.unsave(SavedTable::Tracks, provider, uris).await
    }

    pub async fn unsave_albums(&self, provider: &str, uris: &[String]) -> Result<()> {
        self.unsave(SavedTable::Albums, provider, uris).await
    }

    pub async fn unsave_playlists(&self, provider: &str, uris: &[String]) -> Result<()> {
        self.unsave(SavedTable::Playlists, provider, uris).await
    }

    async fn unsave(&self, table: SavedTable, provider: &str, uris: &[String]) -> Result<()> {
        let mut tx = self.transaction();
        cache::remove_saved_items(&mut tx, table, provider, uris);
        self.commit(tx, &CacheOptions::default()).await
    }

    pub async fn follow_artists(&self, provider: &str, artists: &[Artist]) -> Result<()> {
        let mut tx = self.transaction();
        cache::write_followed_artists(&mut tx, provider, artists);
        self.commit(tx, &CacheOptions::default()).await
    }

    pub async fn unfollow_artists(&self, provider: &str, artist_uris: &[String]) -> Result<()> {
        let mut tx = self.transaction();
        cache::remove_followed_artists(&mut tx, provider, artist_uris);
        self.commit(tx, &CacheOptions::default()).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_track_json(&self, uri: &str) -> Result<Option<Value>> {
        queries::get_track_json(&self.pool, uri).await
    }

    pub async fn get_artist_json(&self, uri: &str) -> Result<Option<Value>> {
        queries::get_artist_json(&self.pool, uri).await
    }

    pub async fn get_track_collection_json(&self, uri: &str) -> Result<Option<Value>> {
        queries::get_track_collection_json(&self.pool, uri).await
    }

    pub async fn get_track_collection_items_json(&self, uri: &str, range: IndexRange) -> Result<Vec<Value>> {
        queries::get_track_collection_items_json(&self.pool, uri, range).await
    }

    pub async fn get_saved_tracks_count(&self, provider: Option<&str>) -> Result<u64> {
        queries::get_saved_count(&self.pool, SavedTable::Tracks, provider).await
    }

    pub async fn get_saved_albums_count(&self, provider: Option<&str>) -> Result<u64> {
        queries::get_saved_count(&self.pool, SavedTable::Albums, provider).await
    }

    pub async fn get_saved_playlists_count(&self, provider: Option<&str>) -> Result<u64> {
        queries::get_saved_count(&self.pool, SavedTable::Playlists, provider).await
    }

    // ========================================================================
    // Persisted state
    // ========================================================================

    pub async fn get_state(&self, keys: &[String]) -> Result<BTreeMap<String, Option<String>>> {
        state::get_state(&self.pool, keys).await
    }

    pub async fn get_state_value(&self, key: &str, default: Option<&str>) -> Result<Option<String>> {
        state::get_state_value(&self.pool, key, default).await
    }

    pub async fn set_state(&self, updates: &StateUpdates) -> Result<()> {
        state::set_state(&self.pool, updates).await
    }

    pub async fn delete_state(&self, key: &str) -> Result<bool> {
        state::delete_state(&self.pool, key).await
    }

    pub async fn list_sync_checkpoints(&self) -> Result<BTreeMap<String, Option<String>>> {
        state::list_sync_checkpoints(&self.pool).await
    }
}
