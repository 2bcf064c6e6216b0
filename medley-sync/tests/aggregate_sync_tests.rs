//! All-providers sync tests
//!
//! Provider ordering, failure handling with its status lines, and
//! cancellation while a provider is mid-batch.

mod helpers;

use helpers::{create_test_library, page, record_statuses, saved_track, ScriptedProvider, Step};
use medley_common::db::sync_resume_key;
use medley_common::media::Track;
use medley_sync::sync::AggregateSyncJob;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn one_track_page(provider: &str, resume: &str) -> Step {
    let track = Track::new(format!("{}:track:1", provider), provider, "Song");
    Step::Page(page(vec![saved_track(provider, track)], resume, true))
}

#[tokio::test]
async fn test_all_eligible_providers_synced() {
    let a = ScriptedProvider::new("a", "Alpha");
    let b = ScriptedProvider::new("b", "Beta").without_library();
    let c = ScriptedProvider::new("c", "Gamma");
    a.push(one_track_page("a", "a1"));
    c.push(one_track_page("c", "c1"));
    let (_dir, library) = create_test_library(&[a.clone(), b.clone(), c.clone()]).await;

    let task = library.synchronize_all_libraries();
    assert!(library.is_synchronizing_libraries());
    assert!(task.wait().await.is_done());

    let status = task.status();
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.text, "2 / 2 libraries synced successfully");
    assert!(b.resumes().is_empty());

    let db = library.database();
    assert_eq!(db.get_saved_tracks_count(Some("a")).await.unwrap(), 1);
    assert_eq!(db.get_saved_tracks_count(Some("c")).await.unwrap(), 1);
    assert!(!library.is_synchronizing_libraries());
}

#[tokio::test]
async fn test_failed_provider_reported_and_skipped() {
    let a = ScriptedProvider::new("a", "Alpha").logged_out();
    let b = ScriptedProvider::new("b", "Beta");
    b.push(one_track_page("b", "b1"));
    let (_dir, library) = create_test_library(&[a.clone(), b.clone()]).await;

    let task = library.synchronize_all_libraries();
    let statuses = record_statuses(&task);
    assert!(task.wait().await.is_done());

    let statuses = statuses.lock().unwrap();
    assert!(statuses
        .iter()
        .any(|s| s.text == "Error syncing Alpha library: Alpha is not logged in"));
    assert_eq!(
        statuses.last().map(|s| s.text.as_str()),
        Some("1 / 2 libraries synced successfully")
    );
    // Progress never moves backwards
    assert!(statuses
        .windows(2)
        .all(|pair| pair[0].progress <= pair[1].progress));
    assert_eq!(b.resumes().len(), 1);
}

#[tokio::test]
async fn test_in_flight_providers_run_first() {
    let a = ScriptedProvider::new("a", "Alpha");
    let b = ScriptedProvider::new("b", "Beta");
    let c = ScriptedProvider::new("c", "Gamma");
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    c.push(Step::Gated {
        page: page(vec![], "c1", true),
        entered: entered.clone(),
        release: release.clone(),
    });
    let (_dir, library) = create_test_library(&[a.clone(), b.clone(), c.clone()]).await;

    // C is running and B is queued behind it before the aggregate starts
    let c_task = library.synchronize_provider_library("c").unwrap();
    entered.notified().await;
    let b_task = library.synchronize_provider_library("b").unwrap();

    let order: Vec<String> = AggregateSyncJob::new(library.clone())
        .plan()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(order, vec!["c", "b", "a"]);

    // Release C only once the aggregate is relaying its status
    let task = library.synchronize_all_libraries();
    let following = Arc::new(Notify::new());
    let signal = following.clone();
    task.add_status_change_listener(move |status| {
        if status.text.contains("Gamma") {
            signal.notify_one();
        }
    });
    following.notified().await;
    release.notify_one();
    assert!(task.wait().await.is_done());
    assert!(c_task.wait().await.is_done());
    assert!(b_task.wait().await.is_done());
    assert_eq!(task.status().text, "3 / 3 libraries synced successfully");
    // The aggregate joined the existing jobs instead of starting new ones
    assert_eq!(b.resumes().len(), 1);
    assert_eq!(c.resumes().len(), 1);
}

#[tokio::test]
async fn test_cancel_mid_batch_stops_remaining_providers() {
    let a = ScriptedProvider::new("a", "Alpha");
    let b = ScriptedProvider::new("b", "Beta");
    let c = ScriptedProvider::new("c", "Gamma");
    a.push(one_track_page("a", "a1"));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    b.push(Step::Gated {
        page: page(
            vec![saved_track("b", Track::new("b:track:1", "b", "Unwritten"))],
            "b1",
            false,
        ),
        entered: entered.clone(),
        release: release.clone(),
    });
    c.push(one_track_page("c", "c1"));
    let (_dir, library) = create_test_library(&[a.clone(), b.clone(), c.clone()]).await;

    let task = library.synchronize_all_libraries();
    entered.notified().await;
    let b_task = library.sync_scheduler().get_task_with_tag("sync:b").unwrap();

    task.cancel();
    release.notify_one();

    let outcome = tokio::time::timeout(Duration::from_secs(5), task.wait())
        .await
        .unwrap();
    assert!(outcome.is_cancelled());
    assert!(b_task.wait().await.is_cancelled());

    let db = library.database();
    assert_eq!(db.get_saved_tracks_count(Some("a")).await.unwrap(), 1);
    assert!(db.get_track_json("b:track:1").await.unwrap().is_none());
    assert!(db
        .get_state_value(&sync_resume_key("b"), None)
        .await
        .unwrap()
        .is_none());
    assert!(c.resumes().is_empty());
    assert!(!library.is_synchronizing_library("c"));
}
