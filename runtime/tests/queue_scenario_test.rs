//! End-to-end walk through one resource's queue lifecycle.
//!
//! Simulated time is driven by a fixed clock, so timeouts and idle windows
//! are crossed without sleeping.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use std::time::Duration;
use turnstile_core::{ChangeKind, Placement, QueueConfig};
use turnstile_runtime::QueueManager;
use turnstile_testing::helpers::{contact, event, participant};
use turnstile_testing::{RecordingPublisher, test_clock};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("turnstile_runtime=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_join_promote_complete_sweep_reap() {
    init_tracing();
    let clock = test_clock();
    let publisher = RecordingPublisher::new();
    let manager = QueueManager::new(QueueConfig::default(), clock.shared(), publisher.shared());
    let e1 = event("E1");

    let a = manager.join(&e1, Some(participant("A")), contact("A")).await;
    assert_eq!((a.position, a.total), (1, 1));

    let b = manager.join(&e1, Some(participant("B")), contact("B")).await;
    assert_eq!((b.position, b.total), (2, 2));

    let promoted = manager.promote_next(&e1).await.unwrap();
    assert_eq!(promoted.participant_id, participant("A"));
    assert!(manager.position(&e1, "A").is_processing());

    let b_now = manager.position(&e1, "B");
    assert_eq!(b_now.placement, Placement::Waiting(1));
    assert_eq!(b_now.total, 1);

    assert!(manager.complete(&e1, &participant("A")).await);

    // B is promoted and then abandons the flow
    manager.promote_next(&e1).await.unwrap();
    clock.advance(Duration::from_secs(61));
    let sweep = manager.sweep().await;
    assert_eq!(sweep.reclaimed, 1);
    assert_eq!(sweep.promoted, 0);
    assert!(manager.status(&e1).processing_ids.is_empty());

    clock.advance(Duration::from_secs(25 * 3600));
    let reap = manager.reap();
    assert_eq!(reap.removed, vec![e1.clone()]);
    assert!(!manager.has_resource(&e1));

    let changes: Vec<ChangeKind> = publisher.published().into_iter().map(|(_, n)| n.change).collect();
    assert_eq!(
        changes,
        vec![
            ChangeKind::Joined,
            ChangeKind::Joined,
            ChangeKind::Promoted,
            ChangeKind::Completed,
            ChangeKind::Promoted,
            ChangeKind::Reclaimed,
        ]
    );
}

#[tokio::test]
async fn test_sweep_promotes_one_per_reclaimed_slot() {
    let clock = test_clock();
    let manager = QueueManager::new(
        QueueConfig::default(),
        clock.shared(),
        RecordingPublisher::new().shared(),
    );
    let e1 = event("E1");

    for id in ["a", "b", "c", "d", "e"] {
        manager.join(&e1, Some(participant(id)), contact(id)).await;
    }
    manager.promote_next(&e1).await;
    manager.promote_next(&e1).await;

    clock.advance(Duration::from_secs(61));
    let report = manager.sweep().await;

    assert_eq!(report.reclaimed, 2);
    assert_eq!(report.promoted, 2);
    let status = manager.status(&e1);
    assert_eq!(status.processing_ids, vec![participant("c"), participant("d")]);
    assert_eq!(status.waiting_count, 1);
}

#[tokio::test]
async fn test_sweep_leaves_fresh_slots_alone() {
    let clock = test_clock();
    let manager = QueueManager::new(
        QueueConfig::default(),
        clock.shared(),
        RecordingPublisher::new().shared(),
    );
    let e1 = event("E1");

    manager.join(&e1, Some(participant("a")), contact("a")).await;
    manager.promote_next(&e1).await;

    clock.advance(Duration::from_secs(60));
    assert_eq!(manager.sweep().await.reclaimed, 0);

    // Position checks are heartbeats too
    manager.position(&e1, "a");
    clock.advance(Duration::from_secs(30));
    assert_eq!(manager.sweep().await.reclaimed, 0);
    assert_eq!(manager.status(&e1).processing_ids, vec![participant("a")]);
}

#[tokio::test]
async fn test_reap_keeps_recently_active_resources() {
    let clock = test_clock();
    let manager = Arc::new(QueueManager::new(
        QueueConfig::default(),
        clock.shared(),
        RecordingPublisher::new().shared(),
    ));

    manager.join(&event("old"), Some(participant("a")), contact("a")).await;
    clock.advance(Duration::from_secs(23 * 3600));
    manager.join(&event("recent"), Some(participant("a")), contact("a")).await;
    clock.advance(Duration::from_secs(2 * 3600));

    let report = manager.reap();

    assert_eq!(report.removed, vec![event("old")]);
    assert!(manager.has_resource(&event("recent")));
    assert_eq!(manager.resource_count(), 1);
}

#[tokio::test]
async fn test_rejoin_after_reap_starts_fresh() {
    let clock = test_clock();
    let manager = QueueManager::new(
        QueueConfig::default(),
        clock.shared(),
        RecordingPublisher::new().shared(),
    );
    let e1 = event("E1");

    manager.join(&e1, Some(participant("a")), contact("a")).await;
    manager.join(&e1, Some(participant("b")), contact("b")).await;
    clock.advance(Duration::from_secs(25 * 3600));
    manager.reap();

    let rejoined = manager.join(&e1, Some(participant("b")), contact("b")).await;
    assert_eq!((rejoined.position, rejoined.total), (1, 1));
}
