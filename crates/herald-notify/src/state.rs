//! Session-fenced shared state
//!
//! All writers (snapshot loads, the change feed task, read-state calls) mutate
//! the store through [`NotificationState`], presenting the [`SessionTicket`] they
//! were started with. Every identity transition bumps the session epoch, so a
//! writer that outlives its session is rejected instead of leaking rows of the
//! previous identity into the new one.
//!
//! Each transition stages a view stamped with a revision while the state lock
//! is held, and publishes it after the lock is released. A view that a newer
//! revision already replaced is skipped, so observers see transitions in order
//! and always end on the latest state. Observers may read the state from their
//! callback; they must not write to it synchronously.

use crate::errors::{ChannelError, EngineWarning, RetrievalError};
use crate::store::{InitializeSummary, MergeOutcome, NotificationStore, ReadMark};
use crate::view::{FeedStatus, NotificationView};
use herald_core::reactive::Dynamic;
use herald_core::{IdentityId, Namespace, Notification, NotificationId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Monotonic session counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability to write into one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTicket {
    /// Session the ticket was issued for
    pub epoch: SessionEpoch,
    /// Identity owning the session
    pub identity: IdentityId,
}

/// Live channel lifecycle as seen by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPhase {
    /// No channel
    #[default]
    Stopped,
    /// Opening
    Connecting,
    /// Open and delivering events
    Active,
    /// Waiting to reopen
    Reconnecting {
        /// Attempt in progress (1-based)
        attempt: u32,
    },
    /// Gave up reopening
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotPhase {
    Pending,
    Settled,
}

struct StateInner {
    namespace: Namespace,
    identity: Option<IdentityId>,
    epoch: SessionEpoch,
    store: NotificationStore,
    snapshot: SnapshotPhase,
    channel: ChannelPhase,
    warning: Option<EngineWarning>,
    closed: bool,
    revision: u64,
}

type Staged = (u64, NotificationView);

impl StateInner {
    fn stage(&mut self) -> Staged {
        self.revision += 1;
        (self.revision, self.view())
    }

    fn status(&self) -> FeedStatus {
        if self.closed {
            return FeedStatus::Closed;
        }
        if self.identity.is_none() {
            return FeedStatus::Idle;
        }
        match self.channel {
            ChannelPhase::Reconnecting { attempt } => return FeedStatus::Reconnecting { attempt },
            ChannelPhase::Exhausted => return FeedStatus::Offline,
            _ => {}
        }
        if self.snapshot == SnapshotPhase::Pending {
            return FeedStatus::Loading;
        }
        match self.channel {
            ChannelPhase::Active => FeedStatus::Live,
            _ => FeedStatus::Connecting,
        }
    }

    fn view(&self) -> NotificationView {
        NotificationView {
            namespace: self.namespace,
            identity: self.identity,
            notifications: self.store.notifications().to_vec(),
            unread_count: self.store.unread_count(),
            status: self.status(),
            warning: self.warning.clone(),
        }
    }

    fn ticket(&self) -> Option<SessionTicket> {
        self.identity.map(|identity| SessionTicket {
            epoch: self.epoch,
            identity,
        })
    }

    fn accepts(&self, ticket: &SessionTicket) -> bool {
        !self.closed && self.epoch == ticket.epoch && self.identity == Some(ticket.identity)
    }

    fn reset(&mut self, identity: Option<IdentityId>) {
        self.epoch = self.epoch.next();
        self.identity = identity;
        self.store.clear();
        self.snapshot = SnapshotPhase::Pending;
        self.channel = ChannelPhase::Stopped;
        self.warning = None;
    }
}

/// Shared, session-fenced notification state with a published view
#[derive(Clone)]
pub struct NotificationState {
    inner: Arc<Mutex<StateInner>>,
    view: Dynamic<NotificationView>,
    published: Arc<Mutex<u64>>,
}

impl NotificationState {
    /// Empty, idle state for a namespace
    pub fn new(namespace: Namespace) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StateInner {
                namespace,
                identity: None,
                epoch: SessionEpoch::default(),
                store: NotificationStore::new(),
                snapshot: SnapshotPhase::Pending,
                channel: ChannelPhase::Stopped,
                warning: None,
                closed: false,
                revision: 0,
            })),
            view: Dynamic::new(NotificationView::empty(namespace)),
            published: Arc::new(Mutex::new(0)),
        }
    }

    /// Published view
    pub fn view(&self) -> Dynamic<NotificationView> {
        self.view.clone()
    }

    /// Ticket of the active session, if an identity is signed in
    pub fn current_session(&self) -> Option<SessionTicket> {
        self.inner.lock().ticket()
    }

    /// Current unread count
    pub fn unread_count(&self) -> usize {
        self.inner.lock().store.unread_count()
    }

    /// Whether the engine was shut down
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Start a new session for `identity`, discarding all prior state.
    pub fn begin_session(&self, identity: IdentityId) -> SessionTicket {
        let (ticket, staged) = {
            let mut inner = self.inner.lock();
            inner.reset(Some(identity));
            let ticket = SessionTicket {
                epoch: inner.epoch,
                identity,
            };
            (ticket, inner.stage())
        };
        tracing::debug!(%identity, epoch = %ticket.epoch, "session started");
        self.publish(staged);
        ticket
    }

    /// End the active session. Later writes with its ticket are rejected.
    pub fn end_session(&self) {
        let staged = {
            let mut inner = self.inner.lock();
            let previous = inner.identity;
            inner.reset(None);
            previous.map(|identity| {
                tracing::debug!(%identity, epoch = %inner.epoch, "session ended");
                inner.stage()
            })
        };
        if let Some(staged) = staged {
            self.publish(staged);
        }
    }

    /// End the active session and refuse all further writes.
    pub fn close(&self) {
        let staged = {
            let mut inner = self.inner.lock();
            inner.reset(None);
            inner.closed = true;
            inner.stage()
        };
        self.publish(staged);
    }

    /// Union a snapshot into the store and mark the snapshot settled.
    pub fn initialize(
        &self,
        ticket: &SessionTicket,
        rows: Vec<Notification>,
    ) -> Option<InitializeSummary> {
        self.apply(ticket, |inner| {
            let summary = inner.store.initialize(rows);
            let settled = inner.snapshot == SnapshotPhase::Pending;
            inner.snapshot = SnapshotPhase::Settled;
            if matches!(inner.warning, Some(EngineWarning::SnapshotUnavailable(_))) {
                inner.warning = None;
            }
            (summary, settled || summary.changed())
        })
    }

    /// Settle a failed snapshot and record the warning.
    pub fn snapshot_failed(&self, ticket: &SessionTicket, error: RetrievalError) -> bool {
        self.apply(ticket, |inner| {
            inner.snapshot = SnapshotPhase::Settled;
            inner.warning = Some(EngineWarning::SnapshotUnavailable(error));
            ((), true)
        })
        .is_some()
    }

    /// Merge one live notification.
    pub fn merge(&self, ticket: &SessionTicket, notification: Notification) -> Option<MergeOutcome> {
        self.apply(ticket, |inner| {
            let outcome = inner.store.merge(notification);
            (outcome, outcome.changed())
        })
    }

    /// Mark one notification read; `None` if the ticket is stale.
    pub fn set_read(&self, ticket: &SessionTicket, id: NotificationId) -> Option<ReadMark> {
        self.apply(ticket, |inner| {
            let mark = inner.store.set_read(id);
            (mark, mark == ReadMark::Flipped)
        })
    }

    /// Mark everything read; returns the ids that were unread.
    pub fn set_all_read(&self, ticket: &SessionTicket) -> Option<Vec<NotificationId>> {
        self.apply(ticket, |inner| {
            let flipped = inner.store.set_all_read();
            let changed = !flipped.is_empty();
            (flipped, changed)
        })
    }

    /// Record the live channel phase.
    pub fn set_channel_phase(&self, ticket: &SessionTicket, phase: ChannelPhase) -> bool {
        self.apply(ticket, |inner| {
            let changed = inner.channel != phase;
            inner.channel = phase;
            if phase == ChannelPhase::Active
                && matches!(inner.warning, Some(EngineWarning::ChannelInterrupted { .. }))
            {
                inner.warning = None;
                return ((), true);
            }
            ((), changed)
        })
        .is_some()
    }

    /// Record a channel interruption and the reconnect attempt it triggers.
    pub fn channel_interrupted(&self, ticket: &SessionTicket, attempt: u32, error: ChannelError) -> bool {
        self.apply(ticket, |inner| {
            inner.channel = ChannelPhase::Reconnecting { attempt };
            inner.warning = Some(EngineWarning::ChannelInterrupted { attempt, error });
            ((), true)
        })
        .is_some()
    }

    /// Record a non-blocking warning.
    pub fn warn(&self, ticket: &SessionTicket, warning: EngineWarning) -> bool {
        self.apply(ticket, |inner| {
            inner.warning = Some(warning);
            ((), true)
        })
        .is_some()
    }

    /// Clear the warning of the active session; `true` if one was cleared.
    pub fn clear_warning(&self, ticket: &SessionTicket) -> bool {
        self.apply(ticket, |inner| {
            let cleared = inner.warning.take().is_some();
            (cleared, cleared)
        })
        .unwrap_or(false)
    }

    fn apply<R>(
        &self,
        ticket: &SessionTicket,
        f: impl FnOnce(&mut StateInner) -> (R, bool),
    ) -> Option<R> {
        let (result, staged) = {
            let mut inner = self.inner.lock();
            if !inner.accepts(ticket) {
                tracing::trace!(
                    epoch = %ticket.epoch,
                    current = %inner.epoch,
                    "rejected write from stale session"
                );
                return None;
            }
            let (result, changed) = f(&mut inner);
            debug_assert!(inner.store.is_consistent());
            (result, changed.then(|| inner.stage()))
        };
        if let Some(staged) = staged {
            self.publish(staged);
        }
        Some(result)
    }

    fn publish(&self, (revision, view): Staged) {
        let mut published = self.published.lock();
        if revision <= *published {
            tracing::trace!(revision, "skipping superseded view");
            return;
        }
        *published = revision;
        self.view.set(view);
    }
}

impl fmt::Debug for NotificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("NotificationState")
            .field("namespace", &inner.namespace)
            .field("identity", &inner.identity)
            .field("epoch", &inner.epoch)
            .field("len", &inner.store.len())
            .field("unread", &inner.store.unread_count())
            .field("status", &inner.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::HeraldError;

    fn note(owner: IdentityId, seed: &str, created_at: u64) -> Notification {
        Notification::new(
            NotificationId::from_seed(seed.as_bytes()),
            owner,
            "system",
            seed,
            created_at,
        )
    }

    #[test]
    fn test_observer_may_read_state_while_publishing() {
        let state = NotificationState::new(Namespace::General);
        let alice = IdentityId::from_seed(b"alice");
        let reader = state.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _handle = state.view().observe(move |view: &NotificationView| {
            sink.lock().push((view.unread_count, reader.unread_count()));
        });

        let ticket = state.begin_session(alice);
        state.merge(&ticket, note(alice, "a", 1));
        state.merge(&ticket, note(alice, "b", 2));
        state.set_read(&ticket, NotificationId::from_seed(b"a"));

        assert_eq!(*seen.lock(), vec![(0, 0), (1, 1), (2, 2), (1, 1)]);
    }

    #[test]
    fn test_superseded_view_is_not_published() {
        let state = NotificationState::new(Namespace::General);
        let alice = IdentityId::from_seed(b"alice");
        let ticket = state.begin_session(alice);

        let older = {
            let mut inner = state.inner.lock();
            inner.store.merge(note(alice, "a", 1));
            inner.stage()
        };
        state.merge(&ticket, note(alice, "b", 2));
        let version = state.view().version();

        state.publish(older);
        assert_eq!(state.view().version(), version);
        assert_eq!(state.view().get().len(), 2);
    }

    #[test]
    fn test_stale_ticket_is_rejected() {
        let state = NotificationState::new(Namespace::General);
        let alice = IdentityId::from_seed(b"alice");
        let bob = IdentityId::from_seed(b"bob");

        let old = state.begin_session(alice);
        let current = state.begin_session(bob);

        assert!(state.merge(&old, note(alice, "a", 1)).is_none());
        assert!(state.merge(&current, note(bob, "b", 2)).is_some());
        assert_eq!(state.view().get().notifications.len(), 1);
        assert_eq!(state.view().get().identity, Some(bob));
    }

    #[test]
    fn test_end_session_clears_everything() {
        let state = NotificationState::new(Namespace::General);
        let alice = IdentityId::from_seed(b"alice");
        let ticket = state.begin_session(alice);
        state.initialize(&ticket, vec![note(alice, "a", 1)]);

        state.end_session();

        let view = state.view().get();
        assert!(view.is_empty());
        assert_eq!(view.unread_count, 0);
        assert_eq!(view.status, FeedStatus::Idle);
        assert!(state.set_read(&ticket, NotificationId::from_seed(b"a")).is_none());
    }

    #[test]
    fn test_status_follows_snapshot_and_channel() {
        let state = NotificationState::new(Namespace::Forum);
        assert_eq!(state.view().get().status, FeedStatus::Idle);

        let ticket = state.begin_session(IdentityId::from_seed(b"alice"));
        assert_eq!(state.view().get().status, FeedStatus::Loading);

        state.set_channel_phase(&ticket, ChannelPhase::Active);
        assert_eq!(state.view().get().status, FeedStatus::Loading);

        state.initialize(&ticket, Vec::new());
        assert_eq!(state.view().get().status, FeedStatus::Live);

        state.channel_interrupted(&ticket, 1, ChannelError::Closed);
        assert_eq!(
            state.view().get().status,
            FeedStatus::Reconnecting { attempt: 1 }
        );
        assert!(state.view().get().warning.is_some());

        state.set_channel_phase(&ticket, ChannelPhase::Active);
        let view = state.view().get();
        assert_eq!(view.status, FeedStatus::Live);
        assert!(view.warning.is_none());

        state.close();
        assert_eq!(state.view().get().status, FeedStatus::Closed);
    }

    #[test]
    fn test_snapshot_failure_settles_with_warning() {
        let state = NotificationState::new(Namespace::General);
        let ticket = state.begin_session(IdentityId::from_seed(b"alice"));
        state.set_channel_phase(&ticket, ChannelPhase::Active);

        assert!(state.snapshot_failed(
            &ticket,
            RetrievalError::Backend(HeraldError::network("down"))
        ));

        let view = state.view().get();
        assert_eq!(view.status, FeedStatus::Live);
        assert!(matches!(
            view.warning,
            Some(EngineWarning::SnapshotUnavailable(_))
        ));
    }

    #[test]
    fn test_duplicate_merge_does_not_republish() {
        let state = NotificationState::new(Namespace::General);
        let alice = IdentityId::from_seed(b"alice");
        let ticket = state.begin_session(alice);
        state.merge(&ticket, note(alice, "a", 1));

        let version = state.view().version();
        assert_eq!(
            state.merge(&ticket, note(alice, "a", 1)),
            Some(MergeOutcome::Duplicate)
        );
        assert_eq!(state.view().version(), version);
    }

    #[test]
    fn test_closed_state_refuses_new_writes() {
        let state = NotificationState::new(Namespace::General);
        let alice = IdentityId::from_seed(b"alice");
        state.close();
        let ticket = state.begin_session(alice);
        assert!(state.merge(&ticket, note(alice, "a", 1)).is_none());
        assert!(state.is_closed());
    }
}
