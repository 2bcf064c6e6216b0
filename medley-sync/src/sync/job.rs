//! Per-provider library synchronization
//!
//! Pulls a provider's library page by page. Each page's items and the resume
//! token that follows them are committed in one transaction, so the stored
//! checkpoint never runs ahead of the stored records. Fetch failures are
//! retried forever with backoff; cancellation stops the loop before the next
//! write.

use crate::error::{ProviderError, SyncError};
use crate::provider::{LibraryPage, MediaProvider};
use crate::scheduler::{TaskHandle, TaskStatus};
use medley_common::cache::CacheOptions;
use medley_common::config::SyncSettings;
use medley_common::db::sync_resume_key;
use medley_common::MediaDatabase;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SyncJob {
    provider: Arc<dyn MediaProvider>,
    db: MediaDatabase,
    settings: SyncSettings,
}

impl SyncJob {
    pub fn new(provider: Arc<dyn MediaProvider>, db: MediaDatabase, settings: SyncSettings) -> Self {
        Self { provider, db, settings }
    }

    /// Run until the provider's sequence is exhausted or `task` is cancelled
    pub async fn run(self, task: TaskHandle) -> anyhow::Result<()> {
        let name = self.provider.name().to_string();
        let display_name = self.provider.display_name().to_string();
        task.set_status(TaskStatus::new(0.0, "Checking sync state"));

        if !self.provider.is_logged_in() {
            return Err(SyncError::NotLoggedIn { provider: display_name }.into());
        }
        if !self.provider.has_personal_library() {
            return Err(SyncError::NoLibrary { provider: display_name }.into());
        }

        let resume_key = sync_resume_key(&name);
        let mut committed = self.load_checkpoint(&resume_key).await?;
        info!(
            provider = %name,
            resuming = committed.is_some(),
            "Starting library sync"
        );

        let mut generator = self.provider.generate_library(committed.clone());
        let mut progress = 0.0;

        loop {
            if task.is_cancelled() {
                debug!(provider = %name, "Library sync cancelled");
                return Ok(());
            }
            task.set_status(TaskStatus::new(
                progress,
                format!("Synchronizing {} library", display_name),
            ));

            let fetched = generator.next().await;
            if task.is_cancelled() {
                // Drop the fetched page unwritten
                debug!(provider = %name, "Library sync cancelled after fetch");
                return Ok(());
            }

            let page = match fetched {
                Ok(page) => page,
                Err(err) => {
                    let delay = self.backoff_for(&err);
                    warn!(
                        provider = %name,
                        retry_in_ms = delay.as_millis() as u64,
                        "Library fetch failed: {}",
                        err
                    );
                    task.set_status(TaskStatus::new(progress, format!("Error: {}", err)));
                    if !task.sleep(delay).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            let done = page.done;
            let page_progress = page.progress;
            let resume = page.resume.clone();
            if let Err(err) = self.commit_page(&resume_key, page).await {
                // Nothing was written; restart the sequence from the last commit
                warn!(provider = %name, "Failed to store library page: {}", err);
                task.set_status(TaskStatus::new(progress, format!("Error: {}", err)));
                if !task.sleep(self.settings.retry_delay()).await {
                    return Ok(());
                }
                generator = self.provider.generate_library(committed.clone());
                continue;
            }
            committed = resume;

            if done {
                task.set_status(TaskStatus::new(
                    1.0,
                    format!("Finished synchronizing {} library", display_name),
                ));
                info!(provider = %name, "Library sync finished");
                return Ok(());
            }

            if let Some(page_progress) = page_progress {
                progress = page_progress.clamp(0.0, 1.0);
            }

            if !task.sleep(self.settings.page_delay()).await {
                return Ok(());
            }
        }
    }

    /// Stored resume token; missing or unparsable means start over
    async fn load_checkpoint(&self, resume_key: &str) -> anyhow::Result<Option<Value>> {
        let stored = self.db.get_state_value(resume_key, None).await?;
        Ok(stored.and_then(|text| match serde_json::from_str::<Value>(&text) {
            Ok(Value::Null) => None,
            Ok(token) => Some(token),
            Err(err) => {
                warn!(
                    key = %resume_key,
                    "Ignoring unparsable sync checkpoint: {}",
                    err
                );
                None
            }
        }))
    }

    /// Write the page's items together with the token that follows them
    async fn commit_page(&self, resume_key: &str, page: LibraryPage) -> anyhow::Result<()> {
        if page.items.is_empty() && page.resume.is_none() {
            return Ok(());
        }
        let mut options = CacheOptions::default();
        let token = match &page.resume {
            Some(token) => Some(serde_json::to_string(token)?),
            None => None,
        };
        options.db_state.insert(resume_key.to_string(), token);
        self.db.cache_library_items(&page.items, &options).await?;
        debug!(
            provider = %self.provider.name(),
            items = page.items.len(),
            "Library page stored"
        );
        Ok(())
    }

    fn backoff_for(&self, err: &ProviderError) -> Duration {
        match err.retry_after_seconds {
            Some(seconds) => {
                Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(self.settings.retry_delay())
            }
            None => self.settings.retry_delay(),
        }
    }
}
