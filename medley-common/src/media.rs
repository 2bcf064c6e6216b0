//! Domain records mirrored from remote catalogs
//!
//! Every record is addressed by a globally unique `uri`. A record is either
//! *full* (fetched in detail) or *partial* (only a stub is known, e.g. an artist
//! referenced by a track). Optional fields set to `None` mean "unknown", not
//! "empty", which is what the coalesce write path relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Artwork reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaImage {
    pub url: String,
    pub size: ImageSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageSize {
    Tiny,
    Small,
    Medium,
    Large,
}

impl MediaImage {
    pub fn new(url: impl Into<String>, size: ImageSize) -> Self {
        Self {
            url: url.into(),
            size,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub uri: String,
    pub provider: String,
    /// Catalog-specific artist type ("artist", "user", ...)
    pub kind: String,
    pub name: String,
    pub images: Option<Vec<MediaImage>>,
    pub partial: bool,
}

impl Artist {
    /// Stub known only by reference
    pub fn stub(uri: impl Into<String>, provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            provider: provider.into(),
            kind: "artist".to_string(),
            name: name.into(),
            images: None,
            partial: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub uri: String,
    pub provider: String,
    pub name: String,
    pub album_name: Option<String>,
    pub album_uri: Option<String>,
    pub artists: Vec<Artist>,
    pub images: Option<Vec<MediaImage>>,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub playable: bool,
    /// 1-based position on its album, when known
    pub track_number: Option<u32>,
    pub partial: bool,
}

impl Track {
    pub fn new(uri: impl Into<String>, provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            provider: provider.into(),
            name: name.into(),
            album_name: None,
            album_uri: None,
            artists: Vec::new(),
            images: None,
            duration: None,
            playable: true,
            track_number: None,
            partial: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Album,
    Playlist,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Album => "album",
            CollectionKind::Playlist => "playlist",
        }
    }
}

/// One entry of a collection, at `index` in the collection's ordering
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionItem {
    pub track: Track,
    /// Only playlists record when an item was added
    pub added_at: Option<DateTime<Utc>>,
}

/// Album or playlist
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCollection {
    pub uri: String,
    pub provider: String,
    pub kind: CollectionKind,
    pub name: String,
    pub version_id: Option<String>,
    pub item_count: Option<u64>,
    /// Album artists; playlists leave this empty
    pub artists: Vec<Artist>,
    pub images: Option<Vec<MediaImage>>,
    /// Loaded items keyed by index; gaps are items not yet fetched
    pub items: BTreeMap<usize, CollectionItem>,
    pub partial: bool,
}

impl TrackCollection {
    pub fn new(
        kind: CollectionKind,
        uri: impl Into<String>,
        provider: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            provider: provider.into(),
            kind,
            name: name.into(),
            version_id: None,
            item_count: None,
            artists: Vec::new(),
            images: None,
            items: BTreeMap::new(),
            partial: false,
        }
    }

    /// Loaded items with `start <= index < end`; an inverted range is empty
    pub fn items_in_range(&self, range: IndexRange) -> impl Iterator<Item = (usize, &CollectionItem)> {
        self.items
            .range(range.start..range.end.max(range.start))
            .map(|(index, item)| (*index, item))
    }
}

/// Half-open index range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaItem {
    Track(Track),
    Collection(TrackCollection),
}

impl MediaItem {
    pub fn uri(&self) -> &str {
        match self {
            MediaItem::Track(track) => &track.uri,
            MediaItem::Collection(collection) => &collection.uri,
        }
    }
}

/// One entry in a user's remote library
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub media_item: MediaItem,
    pub added_at: Option<DateTime<Utc>>,
    /// Name of the provider whose library holds the item
    pub library_provider: String,
}
