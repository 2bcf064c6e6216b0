//! Remote catalog contract
//!
//! A provider wraps one remote catalog (its HTTP client and session). The
//! sync loop only needs the session checks and a resumable, paged sequence
//! over the user's library.

use crate::error::ProviderError;
use async_trait::async_trait;
use medley_common::media::LibraryItem;
use serde_json::Value;
use std::sync::Arc;

/// One step of a library sequence
#[derive(Debug, Clone, Default)]
pub struct LibraryPage {
    pub items: Vec<LibraryItem>,
    /// Token that resumes the sequence after this page; persisted with the items
    pub resume: Option<Value>,
    /// Provider's estimate of overall progress, 0.0 to 1.0
    pub progress: Option<f64>,
    /// No further pages follow
    pub done: bool,
}

/// Resumable sequence over a user's library
#[async_trait]
pub trait LibraryGenerator: Send {
    /// Fetch the next page
    ///
    /// A failed call does not consume anything: calling again retries the
    /// same position.
    async fn next(&mut self) -> Result<LibraryPage, ProviderError>;
}

pub trait MediaProvider: Send + Sync {
    /// Stable identifier, used in tags and state keys
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn is_logged_in(&self) -> bool;

    fn has_personal_library(&self) -> bool;

    /// Start (or resume, from a persisted token) the library sequence
    fn generate_library(&self, resume: Option<Value>) -> Box<dyn LibraryGenerator>;
}

/// Registered providers, in registration order
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MediaProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider; one registered under the same name is replaced in place
    pub fn register(&mut self, provider: Arc<dyn MediaProvider>) {
        match self.providers.iter().position(|p| p.name() == provider.name()) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MediaProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn providers(&self) -> &[Arc<dyn MediaProvider>] {
        &self.providers
    }

    /// Providers exposing a personal library, in registration order
    pub fn with_personal_library(&self) -> Vec<Arc<dyn MediaProvider>> {
        self.providers
            .iter()
            .filter(|p| p.has_personal_library())
            .cloned()
            .collect()
    }
}
