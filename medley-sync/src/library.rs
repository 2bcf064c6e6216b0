//! Media library facade
//!
//! Owns the cache database, the registered providers and the two schedulers
//! that host sync work: one for per-provider jobs (tag `sync:<provider>`) and
//! one for the all-providers job (tag `sync:all`).

use crate::error::{SyncError, SyncResult};
use crate::provider::{MediaProvider, ProviderRegistry};
use crate::scheduler::{TaskHandle, TaskScheduler};
use crate::sync::{AggregateSyncJob, SyncJob};
use medley_common::config::SyncSettings;
use medley_common::MediaDatabase;
use std::sync::Arc;

pub const SYNC_ALL_TAG: &str = "sync:all";

struct LibraryInner {
    db: MediaDatabase,
    providers: ProviderRegistry,
    settings: SyncSettings,
    sync_scheduler: TaskScheduler,
    sync_all_scheduler: TaskScheduler,
}

#[derive(Clone)]
pub struct MediaLibrary {
    inner: Arc<LibraryInner>,
}

impl MediaLibrary {
    /// Must be called within a Tokio runtime (spawns the scheduler workers)
    pub fn new(db: MediaDatabase, providers: ProviderRegistry, settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(LibraryInner {
                db,
                providers,
                settings,
                sync_scheduler: TaskScheduler::new("sync"),
                sync_all_scheduler: TaskScheduler::new("sync-all"),
            }),
        }
    }

    /// Tag of `provider`'s sync job
    pub fn sync_tag(provider: &str) -> String {
        format!("sync:{}", provider)
    }

    pub fn database(&self) -> &MediaDatabase {
        &self.inner.db
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.inner.providers
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn sync_scheduler(&self) -> &TaskScheduler {
        &self.inner.sync_scheduler
    }

    pub fn sync_all_scheduler(&self) -> &TaskScheduler {
        &self.inner.sync_all_scheduler
    }

    /// Start (or join) the sync job of the provider named `name`
    pub fn synchronize_provider_library(&self, name: &str) -> SyncResult<TaskHandle> {
        let provider = self
            .inner
            .providers
            .get(name)
            .ok_or_else(|| SyncError::ProviderNotFound(name.to_string()))?;
        Ok(self.synchronize_library(provider))
    }

    /// Start (or join) `provider`'s sync job
    pub fn synchronize_library(&self, provider: Arc<dyn MediaProvider>) -> TaskHandle {
        let tag = Self::sync_tag(provider.name());
        let job = SyncJob::new(provider, self.inner.db.clone(), self.inner.settings.clone());
        self.inner
            .sync_scheduler
            .run_single(tag, move |task| job.run(task))
    }

    /// Start (or join) the sync of every provider with a personal library
    pub fn synchronize_all_libraries(&self) -> TaskHandle {
        let job = AggregateSyncJob::new(self.clone());
        self.inner
            .sync_all_scheduler
            .run_single(SYNC_ALL_TAG, move |task| job.run(task))
    }

    /// A sync job for `name` is queued or running and not being cancelled
    pub fn is_synchronizing_library(&self, name: &str) -> bool {
        self.inner
            .sync_scheduler
            .get_task_with_tag(&Self::sync_tag(name))
            .is_some_and(|task| !task.is_cancelled())
    }

    pub fn is_synchronizing_libraries(&self) -> bool {
        self.inner
            .sync_all_scheduler
            .get_task_with_tag(SYNC_ALL_TAG)
            .is_some_and(|task| !task.is_cancelled())
    }
}
