//! Scheduler concurrency tests
//!
//! Concurrent callers sharing a tag must end up on one task whose body runs
//! once; cancellation by tag and bulk waits.

use medley_sync::{RunOptions, TaskHandle, TaskScheduler, TaskStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_run_single_runs_body_once() {
    let scheduler = Arc::new(TaskScheduler::new("test"));
    let runs = Arc::new(AtomicUsize::new(0));

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let scheduler = scheduler.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                scheduler.run_single("sync:acme", move |_| async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    anyhow::Ok(())
                })
            })
        })
        .collect();

    let mut handles: Vec<TaskHandle> = Vec::new();
    for caller in callers {
        handles.push(caller.await.unwrap());
    }
    for handle in &handles {
        assert!(handles[0].same_task(handle));
    }
    assert!(handles[0].wait().await.is_done());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // A new cycle after completion runs the body again
    let again = scheduler.run_single("sync:acme", |_| async { anyhow::Ok(()) });
    assert!(!again.same_task(&handles[0]));
    assert!(again.wait().await.is_done());
}

#[tokio::test]
async fn test_cancel_by_tag_and_wait() {
    let scheduler = TaskScheduler::new("test");
    let spawn_waiter = |tag: &str| {
        scheduler.run(RunOptions::tagged(tag), |task| async move {
            task.set_status(TaskStatus::new(0.5, "waiting for cancel"));
            task.cancellation_token().cancelled().await;
            anyhow::Ok(())
        })
    };
    let first = spawn_waiter("import");
    let second = spawn_waiter("import");
    let other = spawn_waiter("export");

    assert_eq!(scheduler.get_tasks_with_tag("import").len(), 2);
    assert_eq!(scheduler.task_count(), 3);

    scheduler.cancel_tasks_with_tag("import");
    scheduler.wait_for_tasks_with_tag("import").await;
    assert!(first.wait().await.is_cancelled());
    assert!(second.wait().await.is_cancelled());

    let replacement = scheduler.run(
        RunOptions {
            tag: Some("fresh".to_string()),
            cancel_all: true,
            ..RunOptions::default()
        },
        |_| async { anyhow::Ok(()) },
    );
    assert!(other.wait().await.is_cancelled());
    assert!(replacement.wait().await.is_done());
    assert_eq!(scheduler.task_count(), 0);
}
