//! Tag-addressable cooperative task scheduler
//!
//! One worker per scheduler runs task bodies one at a time, in submission
//! order. Tags identify tasks for deduplication ([`TaskScheduler::run_single`]),
//! introspection and cancellation. A failing or panicking body ends only its
//! own task; the scheduler never retries.

mod task;

pub use task::{ListenerId, Task, TaskHandle, TaskOutcome, TaskState, TaskStatus};

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

type BoxedBody = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

struct Job {
    handle: TaskHandle,
    body: BoxedBody,
}

/// Options for [`TaskScheduler::run`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub tag: Option<String>,
    /// Cancel queued or running tasks with any of these tags first
    pub cancel_tags: Vec<String>,
    /// Cancel queued or running tasks sharing `tag` first
    pub cancel_matching_tags: bool,
    /// Cancel every queued or running task first
    pub cancel_all: bool,
}

impl RunOptions {
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }
}

type TaskList = Arc<Mutex<Vec<TaskHandle>>>;

fn lock(tasks: &TaskList) -> MutexGuard<'_, Vec<TaskHandle>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TaskScheduler {
    name: String,
    tasks: TaskList,
    jobs: mpsc::UnboundedSender<Job>,
}

impl TaskScheduler {
    /// Create a scheduler and spawn its worker; must be called within a Tokio runtime
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let tasks: TaskList = Arc::new(Mutex::new(Vec::new()));
        let (jobs, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(name.clone(), tasks.clone(), receiver));
        Self { name, tasks, jobs }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start `body` under `tag` unless a task with that tag is still active
    ///
    /// When one is, its handle is returned and `body` is dropped unused.
    pub fn run_single<F, Fut>(&self, tag: impl Into<String>, body: F) -> TaskHandle
    where
        F: FnOnce(TaskHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let tag = tag.into();
        let mut tasks = lock(&self.tasks);
        if let Some(existing) = tasks
            .iter()
            .find(|task| !task.is_finished() && task.tag() == Some(tag.as_str()))
        {
            debug!(scheduler = %self.name, tag = %tag, "Joining active task");
            return existing.clone();
        }
        self.enqueue(&mut tasks, Some(tag), body)
    }

    /// Always start a new task, after the cancellations `options` asks for
    pub fn run<F, Fut>(&self, options: RunOptions, body: F) -> TaskHandle
    where
        F: FnOnce(TaskHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if options.cancel_all {
            self.cancel_all_tasks();
        } else {
            let mut cancel_tags = options.cancel_tags.clone();
            if options.cancel_matching_tags {
                if let Some(tag) = &options.tag {
                    cancel_tags.push(tag.clone());
                }
            }
            if !cancel_tags.is_empty() {
                self.cancel_tasks_with_tags(&cancel_tags);
            }
        }

        let mut tasks = lock(&self.tasks);
        self.enqueue(&mut tasks, options.tag, body)
    }

    fn enqueue<F, Fut>(&self, tasks: &mut Vec<TaskHandle>, tag: Option<String>, body: F) -> TaskHandle
    where
        F: FnOnce(TaskHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = TaskHandle::new(Task::new(tag));
        let job = Job {
            handle: handle.clone(),
            body: Box::pin(body(handle.clone())),
        };
        if self.jobs.send(job).is_err() {
            warn!(scheduler = %self.name, "Scheduler worker stopped; task not started");
            handle.finish(TaskOutcome::Failed(Arc::new(anyhow::anyhow!(
                "Scheduler {} is no longer running",
                self.name
            ))));
            return handle;
        }
        tasks.push(handle.clone());
        handle
    }

    /// Active task carrying `tag`, the earliest submitted first
    pub fn get_task_with_tag(&self, tag: &str) -> Option<TaskHandle> {
        lock(&self.tasks)
            .iter()
            .find(|task| !task.is_finished() && task.tag() == Some(tag))
            .cloned()
    }

    /// Position of the first active task carrying `tag`, in submission order
    pub fn index_of_task_with_tag(&self, tag: &str) -> Option<usize> {
        lock(&self.tasks)
            .iter()
            .filter(|task| !task.is_finished())
            .position(|task| task.tag() == Some(tag))
    }

    pub fn get_tasks_with_tag(&self, tag: &str) -> Vec<TaskHandle> {
        lock(&self.tasks)
            .iter()
            .filter(|task| !task.is_finished() && task.tag() == Some(tag))
            .cloned()
            .collect()
    }

    /// Queued and running tasks
    pub fn task_count(&self) -> usize {
        lock(&self.tasks).iter().filter(|task| !task.is_finished()).count()
    }

    pub fn cancel_all_tasks(&self) {
        let tasks: Vec<TaskHandle> = lock(&self.tasks).clone();
        for task in tasks {
            task.cancel();
        }
    }

    pub fn cancel_tasks_with_tag(&self, tag: &str) {
        for task in self.get_tasks_with_tag(tag) {
            task.cancel();
        }
    }

    pub fn cancel_tasks_with_tags(&self, tags: &[String]) {
        let tasks: Vec<TaskHandle> = lock(&self.tasks)
            .iter()
            .filter(|task| task.tag().is_some_and(|tag| tags.iter().any(|t| t == tag)))
            .cloned()
            .collect();
        for task in tasks {
            task.cancel();
        }
    }

    /// Wait until every task currently carrying `tag` has finished
    pub async fn wait_for_tasks_with_tag(&self, tag: &str) {
        for task in self.get_tasks_with_tag(tag) {
            task.wait().await;
        }
    }
}

async fn run_worker(name: String, tasks: TaskList, mut receiver: mpsc::UnboundedReceiver<Job>) {
    while let Some(Job { handle, body }) = receiver.recv().await {
        let outcome = if handle.mark_running() {
            debug!(scheduler = %name, task_id = %handle.id(), tag = ?handle.tag(), "Task started");
            let result = tokio::spawn(body).await;
            match result {
                Ok(_) if handle.is_cancelled() => Some(TaskOutcome::Cancelled),
                Ok(Ok(())) => Some(TaskOutcome::Done),
                Ok(Err(err)) => {
                    warn!(scheduler = %name, tag = ?handle.tag(), "Task failed: {:#}", err);
                    Some(TaskOutcome::Failed(Arc::new(err)))
                }
                Err(join_err) => {
                    warn!(scheduler = %name, tag = ?handle.tag(), "Task aborted: {}", join_err);
                    Some(TaskOutcome::Failed(Arc::new(anyhow::anyhow!(
                        "Task aborted: {}",
                        join_err
                    ))))
                }
            }
        } else {
            // Cancelled while queued; already finished
            None
        };

        lock(&tasks).retain(|task| !task.same_task(&handle));
        if let Some(outcome) = outcome {
            debug!(scheduler = %name, task_id = %handle.id(), ?outcome, "Task finished");
            handle.finish(outcome);
        }
    }
    debug!(scheduler = %name, "Scheduler worker stopped");
}
