//! Test Helper Utilities
//!
//! Shared utilities for testing medley-sync

#![allow(dead_code)]

pub mod mock_provider;

pub use mock_provider::{page, saved_track, ScriptedProvider, Step};

use medley_common::config::SyncSettings;
use medley_common::MediaDatabase;
use medley_sync::{MediaLibrary, ProviderRegistry, TaskHandle, TaskStatus};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Short delays so retry and grace paths finish quickly
pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        retry_delay_ms: 20,
        page_delay_ms: 5,
        failure_grace_ticks: 2,
        failure_grace_tick_ms: 10,
        ..SyncSettings::default()
    }
}

/// Library over a temporary database with `providers` registered in order
///
/// Returns (TempDir, MediaLibrary) - TempDir must be kept alive for duration of test
pub async fn create_test_library(providers: &[ScriptedProvider]) -> (TempDir, MediaLibrary) {
    let temp_dir = TempDir::new().unwrap();
    let settings = fast_settings();
    let db = MediaDatabase::initialize(temp_dir.path(), &settings).await.unwrap();

    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(Arc::new(provider.clone()));
    }
    (temp_dir, MediaLibrary::new(db, registry, settings))
}

/// Record every status a task reports from now on
pub fn record_statuses(task: &TaskHandle) -> Arc<Mutex<Vec<TaskStatus>>> {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    task.add_status_change_listener(move |status| sink.lock().unwrap().push(status.clone()));
    statuses
}
