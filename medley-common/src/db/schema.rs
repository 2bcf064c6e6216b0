//! Cache schema definitions
//!
//! Single source of truth for table names, column lists and DDL. Column
//! order in the `*_COLUMNS` lists is the order used by the cache write layer
//! when building insert tuples.
//!
//! Parent/child relations (Track -> TrackCollection, TrackCollectionItem ->
//! Track, ...) are not declared as foreign keys; the write layer keeps them
//! consistent by writing parents first.

pub const ARTIST: &str = "Artist";
pub const FOLLOWED_ARTIST: &str = "FollowedArtist";
pub const TRACK_COLLECTION: &str = "TrackCollection";
pub const TRACK_COLLECTION_ARTIST: &str = "TrackCollectionArtist";
pub const TRACK: &str = "Track";
pub const TRACK_ARTIST: &str = "TrackArtist";
pub const TRACK_COLLECTION_ITEM: &str = "TrackCollectionItem";
pub const SAVED_TRACK: &str = "SavedTrack";
pub const SAVED_ALBUM: &str = "SavedAlbum";
pub const SAVED_PLAYLIST: &str = "SavedPlaylist";
pub const DB_STATE: &str = "DBState";

pub const ARTIST_COLUMNS: &[&str] = &["uri", "provider", "type", "name", "images", "updateTime"];
pub const FOLLOWED_ARTIST_COLUMNS: &[&str] = &["artistURI", "libraryProvider", "updateTime"];
pub const TRACK_COLLECTION_COLUMNS: &[&str] = &[
    "uri",
    "provider",
    "type",
    "name",
    "versionId",
    "itemCount",
    "artists",
    "images",
    "updateTime",
];
pub const TRACK_COLLECTION_ARTIST_COLUMNS: &[&str] = &["collectionURI", "artistURI", "updateTime"];
pub const TRACK_COLUMNS: &[&str] = &[
    "uri",
    "provider",
    "name",
    "albumName",
    "albumURI",
    "artists",
    "images",
    "duration",
    "playable",
    "updateTime",
];
pub const TRACK_ARTIST_COLUMNS: &[&str] = &["trackURI", "artistURI", "updateTime"];
pub const TRACK_COLLECTION_ITEM_COLUMNS: &[&str] =
    &["collectionURI", "indexNum", "trackURI", "addedAt", "updateTime"];
/// Album items derived from a track's track number carry no `addedAt`
pub const ALBUM_ITEM_FROM_TRACK_COLUMNS: &[&str] =
    &["collectionURI", "indexNum", "trackURI", "updateTime"];
pub const SAVED_ITEM_COLUMNS: &[&str] = &["itemURI", "libraryProvider", "addedAt", "updateTime"];
pub const DB_STATE_COLUMNS: &[&str] = &["stateKey", "stateValue", "updateTime"];

/// Table creation statements, parents before children
pub const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS Artist (
        uri TEXT NOT NULL,
        provider TEXT NOT NULL,
        type TEXT NOT NULL,
        name TEXT NOT NULL,
        images TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(uri)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS FollowedArtist (
        artistURI TEXT NOT NULL,
        libraryProvider TEXT NOT NULL,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(artistURI, libraryProvider)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS TrackCollection (
        uri TEXT NOT NULL,
        provider TEXT NOT NULL,
        type TEXT NOT NULL,
        name TEXT NOT NULL,
        versionId TEXT,
        itemCount INTEGER,
        artists TEXT,
        images TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(uri)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS TrackCollectionArtist (
        collectionURI TEXT NOT NULL,
        artistURI TEXT NOT NULL,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(collectionURI, artistURI)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS Track (
        uri TEXT NOT NULL,
        provider TEXT NOT NULL,
        name TEXT NOT NULL,
        albumName TEXT,
        albumURI TEXT,
        artists TEXT,
        images TEXT,
        duration REAL,
        playable INTEGER,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(uri)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS TrackArtist (
        trackURI TEXT NOT NULL,
        artistURI TEXT NOT NULL,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(trackURI, artistURI)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS TrackCollectionItem (
        collectionURI TEXT NOT NULL,
        indexNum INTEGER NOT NULL,
        trackURI TEXT NOT NULL,
        addedAt TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(collectionURI, indexNum)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS SavedTrack (
        itemURI TEXT NOT NULL,
        libraryProvider TEXT NOT NULL,
        addedAt TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(itemURI, libraryProvider)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS SavedAlbum (
        itemURI TEXT NOT NULL,
        libraryProvider TEXT NOT NULL,
        addedAt TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(itemURI, libraryProvider)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS SavedPlaylist (
        itemURI TEXT NOT NULL,
        libraryProvider TEXT NOT NULL,
        addedAt TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(itemURI, libraryProvider)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS DBState (
        stateKey TEXT NOT NULL,
        stateValue TEXT,
        updateTime TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY(stateKey)
    )
    "#,
];

/// Table drop statements, children before parents
pub const DROP_TABLES: &[&str] = &[
    "DROP TABLE IF EXISTS DBState",
    "DROP TABLE IF EXISTS SavedPlaylist",
    "DROP TABLE IF EXISTS SavedAlbum",
    "DROP TABLE IF EXISTS SavedTrack",
    "DROP TABLE IF EXISTS TrackCollectionItem",
    "DROP TABLE IF EXISTS TrackArtist",
    "DROP TABLE IF EXISTS Track",
    "DROP TABLE IF EXISTS TrackCollectionArtist",
    "DROP TABLE IF EXISTS TrackCollection",
    "DROP TABLE IF EXISTS FollowedArtist",
    "DROP TABLE IF EXISTS Artist",
];

/// All cache tables, in creation order
pub const ALL_TABLES: &[&str] = &[
    ARTIST,
    FOLLOWED_ARTIST,
    TRACK_COLLECTION,
    TRACK_COLLECTION_ARTIST,
    TRACK,
    TRACK_ARTIST,
    TRACK_COLLECTION_ITEM,
    SAVED_TRACK,
    SAVED_ALBUM,
    SAVED_PLAYLIST,
    DB_STATE,
];
