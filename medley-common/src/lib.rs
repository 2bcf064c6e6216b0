//! # Medley Common Library
//!
//! Shared code for the Medley media cache:
//! - Domain records mirrored from remote catalogs
//! - Database bootstrap, schema and the transaction executor
//! - Coalesce-or-full cache write layer
//! - Persisted key/value state (sync checkpoints)
//! - Configuration loading

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod media;

pub use db::MediaDatabase;
pub use error::{Error, Result};
