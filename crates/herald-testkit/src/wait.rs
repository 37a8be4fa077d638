//! Waiting on reactive values from async tests
//!
//! Intended for tests running with `start_paused = true`, where the sleeps
//! below advance virtual time instantly once the runtime is idle.

use herald_core::reactive::Dynamic;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Wait until `predicate` holds for the value of `dynamic`.
///
/// # Panics
///
/// Panics if the condition is not reached within `timeout`.
pub async fn wait_until<T, F>(dynamic: &Dynamic<T>, timeout: Duration, predicate: F) -> T
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
    F: Fn(&T) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let value = dynamic.get();
        if predicate(&value) {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {timeout:?}; last value: {value:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until a plain condition holds.
///
/// # Panics
///
/// Panics if the condition is not reached within `timeout`.
pub async fn wait_for<F>(timeout: Duration, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {timeout:?}"
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Let spawned tasks run for `duration` of (virtual) time.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
