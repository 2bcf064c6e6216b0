//! Scheduled task state, status and listeners
//!
//! A task moves Waiting -> Running -> Finished. Cancellation is cooperative:
//! [`Task::cancel`] flips the task's cancellation token and the body observes
//! it at its own suspension points. A task cancelled while still Waiting
//! finishes immediately as `Cancelled` and its body never runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type ListenerId = u64;

type StatusListener = Arc<dyn Fn(&TaskStatus) + Send + Sync>;
type CancelListener = Arc<dyn Fn() + Send + Sync>;

/// Live progress of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStatus {
    /// 0.0 to 1.0
    pub progress: f64,
    pub text: String,
}

impl TaskStatus {
    pub fn new(progress: f64, text: impl Into<String>) -> Self {
        Self {
            progress,
            text: text.into(),
        }
    }
}

/// Terminal result of a task
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Done,
    Cancelled,
    Failed(Arc<anyhow::Error>),
}

impl TaskOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            TaskOutcome::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TaskState {
    Waiting,
    Running,
    Finished(TaskOutcome),
}

#[derive(Default)]
struct Listeners {
    next_id: ListenerId,
    status: Vec<(ListenerId, StatusListener)>,
    cancel: Vec<(ListenerId, CancelListener)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Task {
    id: Uuid,
    tag: Option<String>,
    created_at: DateTime<Utc>,
    status: Mutex<TaskStatus>,
    cancel_requested: AtomicBool,
    token: CancellationToken,
    state: watch::Sender<TaskState>,
    listeners: Mutex<Listeners>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("status", &self.status())
            .field("state", &self.state())
            .finish()
    }
}

impl Task {
    pub(crate) fn new(tag: Option<String>) -> Self {
        let (state, _) = watch::channel(TaskState::Waiting);
        Self {
            id: Uuid::new_v4(),
            tag,
            created_at: Utc::now(),
            status: Mutex::new(TaskStatus::default()),
            cancel_requested: AtomicBool::new(false),
            token: CancellationToken::new(),
            state,
            listeners: Mutex::new(Listeners::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TaskStatus {
        lock(&self.status).clone()
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        matches!(*self.state.borrow(), TaskState::Finished(_))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled together with the task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Replace the status and notify status listeners
    pub fn set_status(&self, status: TaskStatus) {
        *lock(&self.status) = status.clone();
        let listeners: Vec<StatusListener> = lock(&self.listeners)
            .status
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&status);
        }
    }

    /// Keep the current progress, replace the text
    pub fn set_status_text(&self, text: impl Into<String>) {
        let progress = lock(&self.status).progress;
        self.set_status(TaskStatus::new(progress, text));
    }

    /// Request cooperative cancellation
    ///
    /// No-op once the task has finished or was already cancelled.
    pub fn cancel(&self) {
        if self.is_finished() || self.cancel_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        self.state.send_if_modified(|state| {
            if matches!(state, TaskState::Waiting) {
                *state = TaskState::Finished(TaskOutcome::Cancelled);
                true
            } else {
                false
            }
        });

        let listeners: Vec<CancelListener> = lock(&self.listeners)
            .cancel
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Sleep for `duration`; returns false if cancelled first
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    pub fn add_status_change_listener(&self, listener: impl Fn(&TaskStatus) + Send + Sync + 'static) -> ListenerId {
        let mut listeners = lock(&self.listeners);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.status.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_status_change_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.status.len();
        listeners.status.retain(|(listener_id, _)| *listener_id != id);
        listeners.status.len() != before
    }

    pub fn add_cancel_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let mut listeners = lock(&self.listeners);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.cancel.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_cancel_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.cancel.len();
        listeners.cancel.retain(|(listener_id, _)| *listener_id != id);
        listeners.cancel.len() != before
    }

    /// Waiting -> Running; false if the task already finished
    pub(crate) fn mark_running(&self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, TaskState::Waiting) {
                *state = TaskState::Running;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn finish(&self, outcome: TaskOutcome) {
        self.state.send_if_modified(|state| {
            if matches!(state, TaskState::Finished(_)) {
                false
            } else {
                *state = TaskState::Finished(outcome);
                true
            }
        });
    }

    /// Wait for the terminal outcome
    pub async fn wait(&self) -> TaskOutcome {
        let mut receiver = self.state.subscribe();
        let finished = receiver
            .wait_for(|state| matches!(state, TaskState::Finished(_)))
            .await;
        match finished.as_deref() {
            Ok(TaskState::Finished(outcome)) => outcome.clone(),
            // The sender lives as long as `self`
            _ => TaskOutcome::Cancelled,
        }
    }
}

/// Shared handle to a scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle(Arc<Task>);

impl TaskHandle {
    pub(crate) fn new(task: Task) -> Self {
        Self(Arc::new(task))
    }

    /// Both handles refer to the same task
    pub fn same_task(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for TaskHandle {
    type Target = Task;

    fn deref(&self) -> &Task {
        &self.0
    }
}
