//! Write batch: pending rows for every cache table
//!
//! Records are added in any order; [`WriteBatch::apply`] emits the statements
//! parents first (artists, collections, tracks) and join rows after, so a
//! committed batch never holds a child row without its parent.

use super::tuples::{artist_set, artists_json, images_json, opt_text, TupleBuilder, TupleSet};
use super::WriteMode;
use crate::db::schema;
use crate::db::transaction::{SqlParam, SqlTransaction};
use crate::media::{
    Artist, CollectionItem, CollectionKind, LibraryItem, MediaItem, Track, TrackCollection,
};
use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are stored as RFC 3339 text
pub(crate) fn timestamp_param(value: &Option<DateTime<Utc>>) -> SqlParam {
    match value {
        Some(at) => SqlParam::Text(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => SqlParam::Null,
    }
}

pub(crate) struct WriteBatch {
    artists: TupleSet,
    collections: TupleSet,
    tracks: TupleSet,
    track_artists: TupleSet,
    collection_artists: TupleSet,
    collection_items: TupleSet,
    album_items: TupleSet,
    saved_tracks: TupleSet,
    saved_albums: TupleSet,
    saved_playlists: TupleSet,
    state: TupleSet,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBatch {
    pub(crate) fn new() -> Self {
        Self {
            artists: artist_set(),
            collections: TupleSet::new(schema::TRACK_COLLECTION, schema::TRACK_COLLECTION_COLUMNS),
            tracks: TupleSet::new(schema::TRACK, schema::TRACK_COLUMNS),
            track_artists: TupleSet::new(schema::TRACK_ARTIST, schema::TRACK_ARTIST_COLUMNS),
            collection_artists: TupleSet::new(
                schema::TRACK_COLLECTION_ARTIST,
                schema::TRACK_COLLECTION_ARTIST_COLUMNS,
            ),
            collection_items: TupleSet::new(
                schema::TRACK_COLLECTION_ITEM,
                schema::TRACK_COLLECTION_ITEM_COLUMNS,
            ),
            album_items: TupleSet::new(
                schema::TRACK_COLLECTION_ITEM,
                schema::ALBUM_ITEM_FROM_TRACK_COLUMNS,
            ),
            saved_tracks: TupleSet::new(schema::SAVED_TRACK, schema::SAVED_ITEM_COLUMNS),
            saved_albums: TupleSet::new(schema::SAVED_ALBUM, schema::SAVED_ITEM_COLUMNS),
            saved_playlists: TupleSet::new(schema::SAVED_PLAYLIST, schema::SAVED_ITEM_COLUMNS),
            state: TupleSet::new(schema::DB_STATE, schema::DB_STATE_COLUMNS),
        }
    }

    pub(crate) fn add_artist(&mut self, artist: &Artist) {
        let mode = WriteMode::for_record(artist.partial);
        let tuple = TupleBuilder::new(schema::ARTIST, &artist.uri, mode)
            .param(&artist.uri)
            .param(&artist.provider)
            .param(&artist.kind)
            .param(&artist.name)
            .maybe_coalesce("images", images_json(&artist.images))
            .now()
            .build();
        self.artists.push(mode, tuple);
    }

    /// Track row, its artists and join rows
    ///
    /// With `include_album`, the track's album is written as a coalesced stub
    /// and, when the track number is known, as an album item.
    pub(crate) fn add_track(&mut self, track: &Track, include_album: bool) {
        for artist in &track.artists {
            if artist.uri.is_empty() {
                continue;
            }
            self.add_artist(artist);
            let join = TupleBuilder::literal(schema::TRACK_ARTIST)
                .param(&track.uri)
                .param(&artist.uri)
                .now()
                .build();
            self.track_artists.push(WriteMode::Full, join);
        }

        if include_album {
            self.add_album_from_track(track);
        }

        let mode = WriteMode::for_record(track.partial);
        let tuple = TupleBuilder::new(schema::TRACK, &track.uri, mode)
            .param(&track.uri)
            .param(&track.provider)
            .param(&track.name)
            .maybe_coalesce("albumName", opt_text(&track.album_name))
            .maybe_coalesce("albumURI", opt_text(&track.album_uri))
            .maybe_coalesce("artists", artists_json(&track.artists))
            .maybe_coalesce("images", images_json(&track.images))
            .maybe_coalesce("duration", track.duration.into())
            .param(track.playable)
            .now()
            .build();
        self.tracks.push(mode, tuple);
    }

    fn add_album_from_track(&mut self, track: &Track) {
        let Some(album_uri) = track.album_uri.as_deref().filter(|uri| !uri.is_empty()) else {
            return;
        };
        let album_name = track.album_name.clone().unwrap_or_default();

        // Only the name is known here; everything else keeps its stored value
        let stub = TupleBuilder::new(schema::TRACK_COLLECTION, album_uri, WriteMode::Coalesce)
            .param(album_uri)
            .param(&track.provider)
            .param("album")
            .param(album_name)
            .coalesce("versionId")
            .coalesce("itemCount")
            .coalesce("artists")
            .coalesce("images")
            .now()
            .build();
        self.collections.push(WriteMode::Coalesce, stub);

        if let Some(track_number) = track.track_number.filter(|n| *n >= 1) {
            let item = TupleBuilder::literal(schema::TRACK_COLLECTION_ITEM)
                .param(album_uri)
                .param(track_number - 1)
                .param(&track.uri)
                .now()
                .build();
            self.album_items.push(WriteMode::Full, item);
        }
    }

    /// Collection row, its artists and join rows; items are not included
    pub(crate) fn add_collection(&mut self, collection: &TrackCollection) {
        for artist in &collection.artists {
            if artist.uri.is_empty() {
                continue;
            }
            self.add_artist(artist);
            let join = TupleBuilder::literal(schema::TRACK_COLLECTION_ARTIST)
                .param(&collection.uri)
                .param(&artist.uri)
                .now()
                .build();
            self.collection_artists.push(WriteMode::Full, join);
        }

        let mode = WriteMode::for_record(collection.partial);
        let tuple = TupleBuilder::new(schema::TRACK_COLLECTION, &collection.uri, mode)
            .param(&collection.uri)
            .param(&collection.provider)
            .param(collection.kind.as_str())
            .param(&collection.name)
            .maybe_coalesce("versionId", opt_text(&collection.version_id))
            .maybe_coalesce("itemCount", collection.item_count.into())
            .maybe_coalesce("artists", artists_json(&collection.artists))
            .maybe_coalesce("images", images_json(&collection.images))
            .now()
            .build();
        self.collections.push(mode, tuple);
    }

    /// Item at `index` of `collection_uri`, with its track
    ///
    /// `include_album` must be false when the collection is itself an album:
    /// its own item rows already place every track.
    pub(crate) fn add_collection_item(
        &mut self,
        collection_uri: &str,
        index: usize,
        item: &CollectionItem,
        include_album: bool,
    ) {
        self.add_track(&item.track, include_album);
        let tuple = TupleBuilder::literal(schema::TRACK_COLLECTION_ITEM)
            .param(collection_uri)
            .param(index)
            .param(&item.track.uri)
            .param(timestamp_param(&item.added_at))
            .now()
            .build();
        self.collection_items.push(WriteMode::Full, tuple);
    }

    /// Media record plus the matching saved-item row
    pub(crate) fn add_library_item(&mut self, item: &LibraryItem) {
        let saved = TupleBuilder::literal(schema::SAVED_TRACK)
            .param(item.media_item.uri())
            .param(&item.library_provider)
            .param(timestamp_param(&item.added_at))
            .now()
            .build();
        match &item.media_item {
            MediaItem::Track(track) => {
                self.add_track(track, true);
                self.saved_tracks.push(WriteMode::Full, saved);
            }
            MediaItem::Collection(collection) => {
                self.add_collection(collection);
                match collection.kind {
                    CollectionKind::Album => self.saved_albums.push(WriteMode::Full, saved),
                    CollectionKind::Playlist => self.saved_playlists.push(WriteMode::Full, saved),
                }
            }
        }
    }

    /// DBState row; `None` stores NULL
    pub(crate) fn add_state(&mut self, key: &str, value: Option<&str>) {
        let tuple = TupleBuilder::literal(schema::DB_STATE)
            .param(key)
            .param(value.map(str::to_string))
            .now()
            .build();
        self.state.push(WriteMode::Full, tuple);
    }

    /// Append every pending statement to `tx`, parents first
    pub(crate) fn apply(self, tx: &mut SqlTransaction) {
        for set in [
            self.artists,
            self.collections,
            self.tracks,
            self.track_artists,
            self.collection_artists,
            self.collection_items,
            self.album_items,
            self.saved_tracks,
            self.saved_albums,
            self.saved_playlists,
            self.state,
        ] {
            if !set.is_empty() {
                set.apply(tx);
            }
        }
    }
}
