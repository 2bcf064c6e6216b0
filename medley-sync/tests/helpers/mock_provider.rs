//! Scripted provider for sync tests
//!
//! Each call to the library sequence consumes the next scripted step. Steps
//! can return a page, fail, or block on a gate until the test releases it.
//! Once the script runs out, the sequence reports completion.

use async_trait::async_trait;
use medley_common::media::{LibraryItem, MediaItem, Track};
use medley_sync::{LibraryGenerator, LibraryPage, MediaProvider, ProviderError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;

pub enum Step {
    Page(LibraryPage),
    Fail(ProviderError),
    /// Signal `entered`, wait for `release`, then return the page
    Gated {
        page: LibraryPage,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    },
}

#[derive(Default)]
struct Recorder {
    script: VecDeque<Step>,
    fetches: Vec<Instant>,
    resumes: Vec<Option<Value>>,
}

#[derive(Clone)]
pub struct ScriptedProvider {
    name: String,
    display_name: String,
    logged_in: bool,
    library: bool,
    recorder: Arc<Mutex<Recorder>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            logged_in: true,
            library: true,
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }

    pub fn logged_out(mut self) -> Self {
        self.logged_in = false;
        self
    }

    pub fn without_library(mut self) -> Self {
        self.library = false;
        self
    }

    pub fn push(&self, step: Step) -> &Self {
        self.recorder.lock().unwrap().script.push_back(step);
        self
    }

    /// Times at which the sequence was asked for a page
    pub fn fetch_times(&self) -> Vec<Instant> {
        self.recorder.lock().unwrap().fetches.clone()
    }

    /// Resume tokens the sequence was started from
    pub fn resumes(&self) -> Vec<Option<Value>> {
        self.recorder.lock().unwrap().resumes.clone()
    }
}

impl MediaProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn has_personal_library(&self) -> bool {
        self.library
    }

    fn generate_library(&self, resume: Option<Value>) -> Box<dyn LibraryGenerator> {
        self.recorder.lock().unwrap().resumes.push(resume);
        Box::new(ScriptedGenerator {
            recorder: self.recorder.clone(),
        })
    }
}

struct ScriptedGenerator {
    recorder: Arc<Mutex<Recorder>>,
}

#[async_trait]
impl LibraryGenerator for ScriptedGenerator {
    async fn next(&mut self) -> Result<LibraryPage, ProviderError> {
        let step = {
            let mut recorder = self.recorder.lock().unwrap();
            recorder.fetches.push(Instant::now());
            recorder.script.pop_front()
        };
        match step {
            Some(Step::Page(page)) => Ok(page),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Gated {
                page,
                entered,
                release,
            }) => {
                entered.notify_one();
                release.notified().await;
                Ok(page)
            }
            None => Ok(LibraryPage {
                done: true,
                ..LibraryPage::default()
            }),
        }
    }
}

/// Saved track owned by `provider`
pub fn saved_track(provider: &str, track: Track) -> LibraryItem {
    LibraryItem {
        media_item: MediaItem::Track(track),
        added_at: None,
        library_provider: provider.to_string(),
    }
}

pub fn page(items: Vec<LibraryItem>, resume: &str, done: bool) -> LibraryPage {
    LibraryPage {
        items,
        resume: Some(Value::String(resume.to_string())),
        progress: None,
        done,
    }
}
