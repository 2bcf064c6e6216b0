//! Read queries
//!
//! Cached records are returned as JSON objects keyed by column name, with the
//! JSON-encoded columns (`artists`, `images`) expanded in place.

use crate::cache::SavedTable;
use crate::db::transaction::{ResultRow, SqlParam, SqlTransaction};
use crate::media::IndexRange;
use crate::{Error, Result};
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;

const JSON_COLUMNS: &[&str] = &["artists", "images"];

fn expand_row(mut row: ResultRow) -> Value {
    for column in JSON_COLUMNS {
        if let Some(Value::String(encoded)) = row.get(*column) {
            if let Ok(decoded) = serde_json::from_str::<Value>(encoded) {
                row.insert(column.to_string(), decoded);
            }
        }
    }
    if let Some(Value::Number(playable)) = row.get("playable") {
        let playable = playable.as_i64().unwrap_or(0) != 0;
        row.insert("playable".to_string(), Value::Bool(playable));
    }
    Value::Object(row)
}

async fn select_one(db: &Pool<Sqlite>, sql: &str, uri: &str) -> Result<Option<Value>> {
    let mut tx = SqlTransaction::non_transactional();
    tx.add_query(sql, vec![uri.into()], "row");
    let mut results = tx.execute(db).await?;
    Ok(results
        .remove("row")
        .and_then(|rows| rows.into_iter().next())
        .map(expand_row))
}

pub async fn get_track_json(db: &Pool<Sqlite>, uri: &str) -> Result<Option<Value>> {
    select_one(db, "SELECT * FROM Track WHERE uri = ?", uri).await
}

pub async fn get_artist_json(db: &Pool<Sqlite>, uri: &str) -> Result<Option<Value>> {
    select_one(db, "SELECT * FROM Artist WHERE uri = ?", uri).await
}

pub async fn get_track_collection_json(db: &Pool<Sqlite>, uri: &str) -> Result<Option<Value>> {
    select_one(db, "SELECT * FROM TrackCollection WHERE uri = ?", uri).await
}

/// Stored items of a collection within `range`, ordered by index
///
/// Each entry is `{indexNum, addedAt, track}`; `track` is null when the
/// referenced track row is missing.
pub async fn get_track_collection_items_json(
    db: &Pool<Sqlite>,
    collection_uri: &str,
    range: IndexRange,
) -> Result<Vec<Value>> {
    let params: Vec<SqlParam> = vec![collection_uri.into(), range.start.into(), range.end.into()];
    let mut tx = SqlTransaction::non_transactional();
    tx.add_query(
        "SELECT indexNum, trackURI, addedAt FROM TrackCollectionItem \
         WHERE collectionURI = ? AND indexNum >= ? AND indexNum < ? ORDER BY indexNum",
        params.clone(),
        "items",
    );
    tx.add_query(
        "SELECT * FROM Track WHERE uri IN (SELECT trackURI FROM TrackCollectionItem \
         WHERE collectionURI = ? AND indexNum >= ? AND indexNum < ?)",
        params,
        "tracks",
    );
    let mut results = tx.execute(db).await?;

    let tracks: HashMap<String, Value> = results
        .remove("tracks")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|row| {
            let uri = row.get("uri")?.as_str()?.to_string();
            Some((uri, expand_row(row)))
        })
        .collect();

    let items = results.remove("items").unwrap_or_default();
    items
        .into_iter()
        .map(|mut item| {
            let track_uri = match item.remove("trackURI") {
                Some(Value::String(uri)) => uri,
                other => {
                    return Err(Error::Internal(format!(
                        "Invalid trackURI in TrackCollectionItem: {:?}",
                        other
                    )))
                }
            };
            let track = tracks.get(&track_uri).cloned().unwrap_or(Value::Null);
            item.insert("track".to_string(), track);
            Ok(Value::Object(item))
        })
        .collect()
}

/// Saved rows in `table`, optionally for one library provider
pub async fn get_saved_count(db: &Pool<Sqlite>, table: SavedTable, provider: Option<&str>) -> Result<u64> {
    let count: i64 = match provider {
        Some(provider) => sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE libraryProvider = ?",
            table.table_name()
        ))
        .bind(provider)
        .fetch_one(db)
        .await
        .map_err(Error::Database)?,
        None => sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.table_name()))
            .fetch_one(db)
            .await
            .map_err(Error::Database)?,
    };
    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{self, CacheOptions};
    use crate::db::init::init_database;
    use crate::media::{Artist, CollectionItem, CollectionKind, LibraryItem, MediaItem, Track, TrackCollection};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, Pool<Sqlite>) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("queries.db"), Duration::from_millis(250))
            .await
            .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_track_json_expands_encoded_columns() {
        let (_dir, pool) = test_pool().await;
        let mut track = Track::new("acme:track:1", "acme", "One");
        track.artists = vec![Artist::stub("acme:artist:1", "acme", "Someone")];
        track.images = Some(vec![]);

        let mut tx = SqlTransaction::new();
        cache::write_tracks(&mut tx, &[track]);
        tx.execute(&pool).await.unwrap();

        let json = get_track_json(&pool, "acme:track:1").await.unwrap().unwrap();
        assert_eq!(json["name"], json!("One"));
        assert_eq!(json["images"], json!([]));
        assert_eq!(json["artists"][0]["uri"], json!("acme:artist:1"));
        assert_eq!(json["playable"], json!(true));

        assert!(get_track_json(&pool, "acme:track:2").await.unwrap().is_none());
        assert_eq!(
            get_artist_json(&pool, "acme:artist:1").await.unwrap().unwrap()["name"],
            json!("Someone")
        );
    }

    #[tokio::test]
    async fn test_collection_items_in_range() {
        let (_dir, pool) = test_pool().await;
        let mut playlist = TrackCollection::new(CollectionKind::Playlist, "acme:pl", "acme", "Mix");
        playlist.item_count = Some(3);
        for index in 0..3 {
            playlist.items.insert(
                index,
                CollectionItem {
                    track: Track::new(format!("acme:track:{}", index), "acme", "T"),
                    added_at: None,
                },
            );
        }
        let mut tx = SqlTransaction::new();
        cache::write_track_collections(&mut tx, std::slice::from_ref(&playlist));
        cache::write_track_collection_items(&mut tx, &playlist, IndexRange::new(0, 3));
        tx.execute(&pool).await.unwrap();

        let items = get_track_collection_items_json(&pool, "acme:pl", IndexRange::new(1, 3))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["indexNum"], json!(1));
        assert_eq!(items[0]["track"]["uri"], json!("acme:track:1"));
        assert_eq!(
            get_track_collection_json(&pool, "acme:pl").await.unwrap().unwrap()["itemCount"],
            json!(3)
        );
    }

    #[tokio::test]
    async fn test_saved_counts_per_provider() {
        let (_dir, pool) = test_pool().await;
        let items: Vec<LibraryItem> = ["acme", "acme", "other"]
            .iter()
            .enumerate()
            .map(|(i, provider)| LibraryItem {
                media_item: MediaItem::Track(Track::new(format!("t:{}", i), *provider, "T")),
                added_at: None,
                library_provider: provider.to_string(),
            })
            .collect();
        let mut tx = SqlTransaction::new();
        cache::write_library_items(&mut tx, &items, &CacheOptions::default());
        tx.execute(&pool).await.unwrap();

        assert_eq!(get_saved_count(&pool, SavedTable::Tracks, None).await.unwrap(), 3);
        assert_eq!(get_saved_count(&pool, SavedTable::Tracks, Some("acme")).await.unwrap(), 2);
        assert_eq!(get_saved_count(&pool, SavedTable::Albums, None).await.unwrap(), 0);
    }
}
