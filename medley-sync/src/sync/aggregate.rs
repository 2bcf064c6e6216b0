//! All-providers synchronization
//!
//! Runs each eligible provider's sync job one after another, forwarding the
//! active child's status as weighted overall progress. A failing provider is
//! reported and skipped after a short grace period; cancelling the aggregate
//! cancels only the active child and starts no further ones.

use crate::library::MediaLibrary;
use crate::provider::MediaProvider;
use crate::scheduler::{TaskHandle, TaskOutcome, TaskStatus};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Where the aggregate run stands between children
struct AggregateState {
    pending: VecDeque<Arc<dyn MediaProvider>>,
    total: usize,
    completed: usize,
    succeeded: usize,
}

/// What to do after one step
enum Step {
    Continue,
    Finished,
}

pub struct AggregateSyncJob {
    library: MediaLibrary,
}

impl AggregateSyncJob {
    pub fn new(library: MediaLibrary) -> Self {
        Self { library }
    }

    /// Providers to sync, in run order
    ///
    /// Providers whose job is already queued or running come first, in their
    /// scheduler order; the rest follow in registration order.
    pub fn plan(&self) -> Vec<Arc<dyn MediaProvider>> {
        let scheduler = self.library.sync_scheduler();
        let mut in_flight: Vec<(usize, Arc<dyn MediaProvider>)> = Vec::new();
        let mut idle: Vec<Arc<dyn MediaProvider>> = Vec::new();
        for provider in self.library.providers().with_personal_library() {
            match scheduler.index_of_task_with_tag(&MediaLibrary::sync_tag(provider.name())) {
                Some(index) => in_flight.push((index, provider)),
                None => idle.push(provider),
            }
        }
        in_flight.sort_by_key(|(index, _)| *index);
        in_flight
            .into_iter()
            .map(|(_, provider)| provider)
            .chain(idle)
            .collect()
    }

    pub async fn run(self, task: TaskHandle) -> anyhow::Result<()> {
        let pending: VecDeque<_> = self.plan().into();
        let mut state = AggregateState {
            total: pending.len(),
            pending,
            completed: 0,
            succeeded: 0,
        };
        info!(providers = state.total, "Starting sync of all libraries");
        task.set_status(TaskStatus::new(0.0, "Synchronizing libraries"));

        loop {
            match self.step(&task, &mut state).await? {
                Step::Continue => {}
                Step::Finished => return Ok(()),
            }
        }
    }

    async fn step(&self, task: &TaskHandle, state: &mut AggregateState) -> anyhow::Result<Step> {
        if task.is_cancelled() {
            return Ok(Step::Finished);
        }

        let Some(provider) = state.pending.pop_front() else {
            let summary = format!(
                "{} / {} libraries synced successfully",
                state.succeeded, state.total
            );
            info!(succeeded = state.succeeded, total = state.total, "{}", summary);
            task.set_status(TaskStatus::new(1.0, summary));
            return Ok(Step::Finished);
        };

        let display_name = provider.display_name().to_string();
        let child = self.library.synchronize_library(provider);
        let outcome = self.follow_child(task, &child, state, &display_name).await;
        state.completed += 1;

        match outcome {
            TaskOutcome::Done => {
                state.succeeded += 1;
            }
            TaskOutcome::Cancelled => {
                if task.is_cancelled() {
                    return Ok(Step::Finished);
                }
                warn!(provider = %display_name, "Library sync was cancelled; skipping");
            }
            TaskOutcome::Failed(err) => {
                warn!(provider = %display_name, "Library sync failed: {:#}", err);
                task.set_status(TaskStatus::new(
                    state.completed as f64 / state.total as f64,
                    format!("Error syncing {} library: {}", display_name, err),
                ));
                // Throttle cascading failures while staying cancellable
                let tick = self.library.settings().failure_grace_tick();
                for _ in 0..self.library.settings().failure_grace_ticks {
                    if !task.sleep(tick).await {
                        return Ok(Step::Finished);
                    }
                }
            }
        }
        Ok(Step::Continue)
    }

    /// Relay status and cancellation between the aggregate and `child` until it finishes
    async fn follow_child(
        &self,
        task: &TaskHandle,
        child: &TaskHandle,
        state: &AggregateState,
        display_name: &str,
    ) -> TaskOutcome {
        let completed = state.completed as f64;
        let total = state.total as f64;

        let relay_target = task.clone();
        let status_listener = child.add_status_change_listener(move |status| {
            relay_target.set_status(TaskStatus::new(
                (completed + status.progress) / total,
                status.text.clone(),
            ));
        });
        let cancel_target = child.clone();
        let cancel_listener = task.add_cancel_listener(move || cancel_target.cancel());

        let current = child.status();
        if current.text.is_empty() {
            task.set_status(TaskStatus::new(
                completed / total,
                format!("Waiting for {} library sync to start", display_name),
            ));
        } else {
            task.set_status(TaskStatus::new(
                (completed + current.progress) / total,
                current.text,
            ));
        }
        // Cancelled before the relay was installed
        if task.is_cancelled() {
            child.cancel();
        }

        let outcome = child.wait().await;
        child.remove_status_change_listener(status_listener);
        task.remove_cancel_listener(cancel_listener);
        outcome
    }
}
