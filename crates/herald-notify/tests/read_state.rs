//! Optimistic read-state: persistence, retries, concurrency, authorization.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use assert_matches::assert_matches;
use herald_core::reliability::RetrySettings;
use herald_core::{HeraldError, IdentityState, Namespace};
use herald_notify::{
    AuthorizationError, EngineConfig, EngineWarning, FeedStatus, NotificationEngine,
    PersistTarget, ReadOutcome,
};
use herald_testkit::{
    identity, notification, notification_batch, notification_id, wait_until, InMemoryBackend,
    NotificationBuilder, WriteRecord,
};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_persistence_retry(RetrySettings {
            max_attempts: 2,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            jitter: false,
        })
        .with_reconnect(RetrySettings {
            max_attempts: u32::MAX,
            initial_delay_ms: 10,
            max_delay_ms: 100,
            jitter: false,
        })
}

async fn live_engine(backend: &InMemoryBackend, who: &str) -> NotificationEngine {
    let engine = NotificationEngine::new(backend.shared(), test_config());
    engine
        .apply_identity(IdentityState::Authenticated(identity(who)))
        .await;
    wait_until(&engine.view(), WAIT, |v| v.status == FeedStatus::Live).await;
    engine
}

// ============================================================================
// mark_read
// ============================================================================

#[tokio::test(start_paused = true)]
async fn mark_read_updates_view_and_backend() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "n", 3));
    let engine = live_engine(&backend, "alice").await;
    let target = notification_id("n-2");

    let outcome = engine.mark_read(target).await.unwrap();

    assert_eq!(
        outcome,
        ReadOutcome::Persisted {
            changed: 1,
            attempts: 1
        }
    );
    assert_eq!(engine.unread_count(), 2);
    assert_eq!(backend.is_read(Namespace::General, target), Some(true));
    assert_eq!(
        backend.writes(),
        vec![WriteRecord::Single {
            namespace: Namespace::General,
            id: target
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn mark_read_on_read_id_is_a_noop() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(
        Namespace::General,
        vec![NotificationBuilder::new(alice, "seen").created_at(5).read().build()],
    );
    let engine = live_engine(&backend, "alice").await;

    assert_eq!(
        engine.mark_read(notification_id("seen")).await.unwrap(),
        ReadOutcome::Unchanged
    );
    assert!(backend.writes().is_empty());
    assert_eq!(backend.write_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn mark_read_before_snapshot_lands_is_persisted() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, vec![notification(alice, "x", 5)]);
    backend.set_fetch_delay(Some(Duration::from_millis(300)));
    let engine = NotificationEngine::new(backend.shared(), test_config());
    engine.apply_identity(IdentityState::Authenticated(alice)).await;
    assert_eq!(engine.current_view().status, FeedStatus::Loading);

    let x = notification_id("x");
    let outcome = engine.mark_read(x).await.unwrap();
    assert_eq!(
        outcome,
        ReadOutcome::Persisted {
            changed: 0,
            attempts: 1
        }
    );
    assert_eq!(backend.is_read(Namespace::General, x), Some(true));

    let view = wait_until(&engine.view(), WAIT, |v| v.len() == 1).await;
    assert!(view.notifications[0].is_read);
    assert_eq!(view.unread_count, 0);
    assert_eq!(engine.mark_read(x).await.unwrap(), ReadOutcome::Unchanged);
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsaved_read_of_unloaded_row_still_shows_read() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, vec![notification(alice, "x", 5)]);
    backend.set_fetch_delay(Some(Duration::from_millis(300)));
    backend.fail_all_writes(Some(HeraldError::network("offline")));
    let engine = NotificationEngine::new(backend.shared(), test_config());
    engine.apply_identity(IdentityState::Authenticated(alice)).await;

    let x = notification_id("x");
    assert_matches!(engine.mark_read(x).await.unwrap(), ReadOutcome::LocalOnly(_));
    assert_eq!(backend.is_read(Namespace::General, x), Some(false));

    // The snapshot still reports the row unread.
    let view = wait_until(&engine.view(), WAIT, |v| v.len() == 1).await;
    assert!(view.notifications[0].is_read);
    assert_eq!(view.unread_count, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_mark_read_decrements_once() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "n", 2));
    let engine = live_engine(&backend, "alice").await;
    let target = notification_id("n-1");

    let (first, second) = tokio::join!(engine.mark_read(target), engine.mark_read(target));
    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(ReadOutcome::is_persisted);

    assert_eq!(outcomes[0], ReadOutcome::Unchanged);
    assert!(outcomes[1].is_persisted());
    assert_eq!(engine.unread_count(), 1);
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_write_failure_is_retried() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "n", 1));
    let engine = live_engine(&backend, "alice").await;
    backend.fail_next_writes(2, HeraldError::network("flaky"));

    let outcome = engine.mark_read(notification_id("n-1")).await.unwrap();

    assert_eq!(
        outcome,
        ReadOutcome::Persisted {
            changed: 1,
            attempts: 3
        }
    );
    assert!(engine.current_view().warning.is_none());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_keep_local_state_and_warn() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "n", 2));
    let engine = live_engine(&backend, "alice").await;
    backend.fail_all_writes(Some(HeraldError::network("offline")));
    let target = notification_id("n-2");

    let outcome = engine.mark_read(target).await.unwrap();

    let error = assert_matches!(outcome, ReadOutcome::LocalOnly(error) => error);
    assert_eq!(error.attempts, 3);
    assert_eq!(error.target, PersistTarget::Single(target));
    assert_eq!(backend.write_attempts(), 3);

    let view = engine.current_view();
    assert_eq!(view.unread_count, 1);
    assert!(view
        .notifications
        .iter()
        .any(|n| n.id == target && n.is_read));
    assert_matches!(view.warning, Some(EngineWarning::ReadStateNotSaved(_)));
    assert_eq!(backend.is_read(Namespace::General, target), Some(false));

    assert!(engine.dismiss_warning());
    let view = engine.current_view();
    assert!(view.warning.is_none());
    assert_eq!(view.unread_count, 1);
    assert!(!engine.dismiss_warning());
}

#[tokio::test(start_paused = true)]
async fn permanent_write_failure_is_not_retried() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "n", 1));
    let engine = live_engine(&backend, "alice").await;
    backend.fail_all_writes(Some(HeraldError::permission_denied("row level security")));

    let outcome = engine.mark_read(notification_id("n-1")).await.unwrap();

    let error = assert_matches!(outcome, ReadOutcome::LocalOnly(error) => error);
    assert_eq!(error.attempts, 1);
    assert_eq!(engine.unread_count(), 0);
}

// Scenario: a live event arrives before the snapshot, the user reads it, the
// write fails, then the snapshot lands still reporting it unread.
#[tokio::test(start_paused = true)]
async fn local_read_survives_stale_snapshot() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "seed", 2));
    backend.set_fetch_delay(Some(Duration::from_millis(500)));
    backend.fail_all_writes(Some(HeraldError::network("offline")));

    let engine = NotificationEngine::new(backend.shared(), test_config());
    engine
        .apply_identity(IdentityState::Authenticated(alice))
        .await;
    herald_testkit::wait_for(WAIT, || backend.active_subscriptions_for(alice) == 1).await;

    backend.insert(Namespace::General, notification(alice, "d", 40));
    wait_until(&engine.view(), WAIT, |v| v.len() == 1).await;
    let outcome = engine.mark_read(notification_id("d")).await.unwrap();
    assert_matches!(outcome, ReadOutcome::LocalOnly(_));

    let view = wait_until(&engine.view(), WAIT, |v| v.status == FeedStatus::Live).await;
    assert_eq!(view.len(), 3);
    assert_eq!(view.unread_count, 2);
    assert!(view.notifications[0].is_read);
}

// ============================================================================
// mark_all_read
// ============================================================================

#[tokio::test(start_paused = true)]
async fn mark_all_read_writes_only_previously_unread() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(
        Namespace::General,
        vec![
            notification(alice, "a", 1),
            NotificationBuilder::new(alice, "b").created_at(2).read().build(),
            notification(alice, "c", 3),
        ],
    );
    let engine = live_engine(&backend, "alice").await;

    let outcome = engine.mark_all_read(alice).await.unwrap();

    assert_eq!(
        outcome,
        ReadOutcome::Persisted {
            changed: 2,
            attempts: 1
        }
    );
    assert_eq!(engine.unread_count(), 0);
    assert_eq!(
        backend.writes(),
        vec![WriteRecord::Bulk {
            namespace: Namespace::General,
            owner: alice,
            ids: vec![notification_id("c"), notification_id("a")],
        }]
    );
    assert_eq!(
        engine.mark_all_read(alice).await.unwrap(),
        ReadOutcome::Unchanged
    );
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn mark_all_read_failure_keeps_local_state() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    backend.seed(Namespace::General, notification_batch(alice, "n", 4));
    let engine = live_engine(&backend, "alice").await;
    backend.fail_all_writes(Some(HeraldError::timeout("gateway")));

    let outcome = engine.mark_all_read(alice).await.unwrap();

    let error = assert_matches!(outcome, ReadOutcome::LocalOnly(error) => error);
    assert_eq!(error.target, PersistTarget::Bulk { owner: alice, count: 4 });
    assert_eq!(engine.unread_count(), 0);
    assert!(engine.current_view().warning.is_some());
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test(start_paused = true)]
async fn read_state_requires_identity() {
    let backend = InMemoryBackend::new();
    let engine = NotificationEngine::new(backend.shared(), test_config());

    assert_eq!(
        engine.mark_read(notification_id("x")).await,
        Err(AuthorizationError::NoIdentity)
    );
    assert_eq!(
        engine.mark_all_read(identity("alice")).await,
        Err(AuthorizationError::NoIdentity)
    );
    assert_eq!(backend.write_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn mark_all_read_rejects_other_identity() {
    let backend = InMemoryBackend::new();
    let alice = identity("alice");
    let mallory = identity("mallory");
    backend.seed(Namespace::General, notification_batch(alice, "n", 2));
    let engine = live_engine(&backend, "alice").await;

    assert_eq!(
        engine.mark_all_read(mallory).await,
        Err(AuthorizationError::IdentityMismatch {
            requested: mallory,
            active: alice
        })
    );
    assert_eq!(engine.unread_count(), 2);
}
