//! Identity resolution signal
//!
//! The identity provider publishes its state through a watch channel. Consumers
//! await an explicit "resolution complete" transition instead of sleeping for a
//! fixed delay and hoping the profile has loaded by then.

use crate::IdentityId;
use tokio::sync::watch;

/// Current state of the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityState {
    /// The provider has not finished resolving the session yet
    #[default]
    Resolving,
    /// A principal is signed in
    Authenticated(IdentityId),
    /// Resolution finished and nobody is signed in
    Anonymous,
}

impl IdentityState {
    /// The signed-in identity, if any
    #[must_use]
    pub fn identity(&self) -> Option<IdentityId> {
        match self {
            Self::Authenticated(id) => Some(*id),
            Self::Resolving | Self::Anonymous => None,
        }
    }

    /// Whether resolution has completed (either way)
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Resolving)
    }
}

/// Publishing side of the identity signal, owned by the identity provider.
#[derive(Debug)]
pub struct IdentitySource {
    tx: watch::Sender<IdentityState>,
}

impl IdentitySource {
    /// Create a source that starts out resolving
    pub fn new() -> Self {
        Self::with_state(IdentityState::Resolving)
    }

    /// Create a source with a known initial state
    pub fn with_state(state: IdentityState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx }
    }

    /// Publish a new state. Never fails, even with no watchers attached.
    pub fn publish(&self, state: IdentityState) {
        self.tx.send_replace(state);
    }

    /// Shorthand for publishing `Authenticated(identity)`
    pub fn sign_in(&self, identity: IdentityId) {
        self.publish(IdentityState::Authenticated(identity));
    }

    /// Shorthand for publishing `Anonymous`
    pub fn sign_out(&self) {
        self.publish(IdentityState::Anonymous);
    }

    /// The last published state
    pub fn current(&self) -> IdentityState {
        *self.tx.borrow()
    }

    /// Attach a new watcher
    pub fn watch(&self) -> IdentityWatcher {
        IdentityWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for IdentitySource {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the identity signal.
#[derive(Debug, Clone)]
pub struct IdentityWatcher {
    rx: watch::Receiver<IdentityState>,
}

impl IdentityWatcher {
    /// The latest state, without waiting
    pub fn current(&self) -> IdentityState {
        *self.rx.borrow()
    }

    /// Wait until resolution has completed.
    ///
    /// Returns `None` if the source was dropped before resolving.
    pub async fn wait_resolved(&mut self) -> Option<IdentityState> {
        self.rx
            .wait_for(IdentityState::is_resolved)
            .await
            .ok()
            .map(|state| *state)
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` once the source has been dropped.
    pub async fn changed(&mut self) -> Option<IdentityState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolved_blocks_until_signal() {
        let source = IdentitySource::new();
        let mut watcher = source.watch();
        let alice = IdentityId::from_seed(b"alice");

        let waiter = tokio::spawn(async move { watcher.wait_resolved().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        source.sign_in(alice);
        let resolved = waiter.await.unwrap();
        assert_eq!(resolved, Some(IdentityState::Authenticated(alice)));
    }

    #[tokio::test]
    async fn test_wait_resolved_returns_immediately_when_known() {
        let source = IdentitySource::with_state(IdentityState::Anonymous);
        let mut watcher = source.watch();
        assert_eq!(watcher.wait_resolved().await, Some(IdentityState::Anonymous));
    }

    #[tokio::test]
    async fn test_changed_reports_none_after_drop() {
        let source = IdentitySource::new();
        let mut watcher = source.watch();
        source.sign_out();
        assert_eq!(watcher.changed().await, Some(IdentityState::Anonymous));
        drop(source);
        assert_eq!(watcher.changed().await, None);
    }

    #[test]
    fn test_state_accessors() {
        let id = IdentityId::from_seed(b"x");
        assert_eq!(IdentityState::Authenticated(id).identity(), Some(id));
        assert!(!IdentityState::Resolving.is_resolved());
        assert!(IdentityState::Anonymous.is_resolved());
        assert_eq!(IdentityState::Anonymous.identity(), None);
    }
}
