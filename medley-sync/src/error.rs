//! Error types for medley-sync

use thiserror::Error;

/// Failure of one step of a provider's library sequence
///
/// Always treated as transient by the sync loop. `retry_after_seconds` is the
/// provider's hint for how long to wait before asking again.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub retry_after_seconds: Option<f64>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    pub fn with_retry_after(mut self, seconds: f64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Provider session is not authenticated
    #[error("{provider} is not logged in")]
    NotLoggedIn { provider: String },

    /// Provider exposes no personal library
    #[error("{provider} does not have a user library")]
    NoLibrary { provider: String },

    #[error("No provider named {0}")]
    ProviderNotFound(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
