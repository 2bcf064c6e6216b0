//! Cache write layer
//!
//! Turns domain records into ordered upsert statements appended to a
//! [`SqlTransaction`]. Full records replace every column; partial records are
//! written in coalesce mode so unknown fields keep what is already stored.
//! Writing the same batch twice leaves the same rows (apart from
//! `updateTime`).

mod batch;
mod tuples;

use crate::db::schema;
use crate::db::transaction::{SqlParam, SqlTransaction};
use crate::media::{Artist, CollectionKind, IndexRange, LibraryItem, Track, TrackCollection};
use batch::WriteBatch;
use std::collections::BTreeMap;

/// How a record's unknown fields are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Every column takes the incoming value, NULL included
    Full,
    /// Unknown columns keep the stored value
    Coalesce,
}

impl WriteMode {
    pub fn for_record(partial: bool) -> Self {
        if partial {
            WriteMode::Coalesce
        } else {
            WriteMode::Full
        }
    }
}

/// DBState rows to write; a `None` value stores NULL
pub type StateUpdates = BTreeMap<String, Option<String>>;

/// Extra writes committed together with a cache batch
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub db_state: StateUpdates,
}

/// Saved-item tables, one per library item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedTable {
    Tracks,
    Albums,
    Playlists,
}

impl SavedTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            SavedTable::Tracks => schema::SAVED_TRACK,
            SavedTable::Albums => schema::SAVED_ALBUM,
            SavedTable::Playlists => schema::SAVED_PLAYLIST,
        }
    }
}

pub fn write_artists(tx: &mut SqlTransaction, artists: &[Artist]) {
    let mut batch = WriteBatch::new();
    for artist in artists {
        batch.add_artist(artist);
    }
    batch.apply(tx);
}

/// Tracks with their artists, album stubs and album items
pub fn write_tracks(tx: &mut SqlTransaction, tracks: &[Track]) {
    let mut batch = WriteBatch::new();
    for track in tracks {
        batch.add_track(track, true);
    }
    batch.apply(tx);
}

/// Collection rows with their artists; items are written separately
pub fn write_track_collections(tx: &mut SqlTransaction, collections: &[TrackCollection]) {
    let mut batch = WriteBatch::new();
    for collection in collections {
        batch.add_collection(collection);
    }
    batch.apply(tx);
}

/// Refresh the stored items of `collection` within `range`
///
/// Stored items at or past the collection's item count are removed first,
/// then every loaded item inside `range` is upserted with its track.
pub fn write_track_collection_items(
    tx: &mut SqlTransaction,
    collection: &TrackCollection,
    range: IndexRange,
) {
    if let Some(item_count) = collection.item_count {
        tx.add_sql(
            "DELETE FROM TrackCollectionItem WHERE collectionURI = ? AND indexNum >= ?",
            vec![SqlParam::from(&collection.uri), SqlParam::from(item_count)],
        );
    }

    let include_album = collection.kind != CollectionKind::Album;
    let mut batch = WriteBatch::new();
    for (index, item) in collection.items_in_range(range) {
        batch.add_collection_item(&collection.uri, index, item, include_album);
    }
    batch.apply(tx);
}

/// Library items, their saved rows and `options.db_state`, as one batch
pub fn write_library_items(tx: &mut SqlTransaction, items: &[LibraryItem], options: &CacheOptions) {
    let mut batch = WriteBatch::new();
    for item in items {
        batch.add_library_item(item);
    }
    for (key, value) in &options.db_state {
        batch.add_state(key, value.as_deref());
    }
    batch.apply(tx);
}

pub fn write_state(tx: &mut SqlTransaction, updates: &StateUpdates) {
    let mut batch = WriteBatch::new();
    for (key, value) in updates {
        batch.add_state(key, value.as_deref());
    }
    batch.apply(tx);
}

/// Remove saved rows of `provider` for the given item URIs
pub fn remove_saved_items(tx: &mut SqlTransaction, table: SavedTable, provider: &str, uris: &[String]) {
    for uri in uris {
        tx.add_sql(
            format!(
                "DELETE FROM {} WHERE itemURI = ? AND libraryProvider = ?",
                table.table_name()
            ),
            vec![uri.into(), provider.into()],
        );
    }
}

/// Record artists as followed in `provider`'s library; artist rows are written first
pub fn write_followed_artists(tx: &mut SqlTransaction, provider: &str, artists: &[Artist]) {
    write_artists(tx, artists);
    for artist in artists {
        tx.add_sql(
            "INSERT OR REPLACE INTO FollowedArtist (artistURI, libraryProvider, updateTime) \
             VALUES (?, ?, CURRENT_TIMESTAMP)",
            vec![(&artist.uri).into(), provider.into()],
        );
    }
}

pub fn remove_followed_artists(tx: &mut SqlTransaction, provider: &str, artist_uris: &[String]) {
    for uri in artist_uris {
        tx.add_sql(
            "DELETE FROM FollowedArtist WHERE artistURI = ? AND libraryProvider = ?",
            vec![uri.into(), provider.into()],
        );
    }
}
