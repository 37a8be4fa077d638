//! Notification engine
//!
//! Lifecycle owner for one namespace: reacts to identity transitions, runs
//! the snapshot load and the live channel of the active session, and exposes
//! read-state operations and the published view.
//!
//! Session transitions are serialized. Switching identity ends the old
//! session (fencing its writers), waits for its tasks to stop, then starts the
//! new session's snapshot load and channel concurrently. Nothing starts while
//! identity resolution is still in progress.

use crate::config::EngineConfig;
use crate::errors::{AuthorizationError, EngineWarning, NotifyError};
use crate::feed::{ChangeFeedSubscriber, SessionState};
use crate::read_state::{ReadOutcome, ReadStateCoordinator};
use crate::snapshot::SnapshotLoader;
use crate::state::{NotificationState, SessionTicket};
use crate::store::InitializeSummary;
use crate::task_registry::TaskRegistry;
use crate::view::NotificationView;
use herald_core::effects::NotificationBackend;
use herald_core::reactive::{Dynamic, ObserverHandle};
use herald_core::{IdentityId, IdentityState, IdentityWatcher, Namespace, NotificationId};
use std::sync::Arc;

#[derive(Default)]
struct Lifecycle {
    session: Option<SessionTicket>,
    tasks: Option<TaskRegistry>,
    shut_down: bool,
}

/// Realtime notification engine for one namespace
pub struct NotificationEngine {
    config: EngineConfig,
    state: NotificationState,
    loader: SnapshotLoader,
    subscriber: ChangeFeedSubscriber,
    coordinator: ReadStateCoordinator,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

impl NotificationEngine {
    /// Engine over `backend`; idle until an identity is applied.
    pub fn new(backend: Arc<dyn NotificationBackend>, config: EngineConfig) -> Self {
        let state = NotificationState::new(config.namespace);
        let loader = SnapshotLoader::new(backend.clone(), &config);
        let subscriber =
            ChangeFeedSubscriber::new(backend.clone(), state.clone(), loader.clone(), &config);
        let coordinator = ReadStateCoordinator::new(backend, state.clone(), &config);

        Self {
            config,
            state,
            loader,
            subscriber,
            coordinator,
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Namespace served
    pub fn namespace(&self) -> Namespace {
        self.config.namespace
    }

    /// Published view
    pub fn view(&self) -> Dynamic<NotificationView> {
        self.state.view()
    }

    /// Current view
    pub fn current_view(&self) -> NotificationView {
        self.state.view().get()
    }

    /// Current unread count
    pub fn unread_count(&self) -> usize {
        self.state.unread_count()
    }

    /// Identity of the active session
    pub fn active_identity(&self) -> Option<IdentityId> {
        self.state.current_session().map(|ticket| ticket.identity)
    }

    /// Live channel lifecycle state
    pub fn session_state(&self) -> SessionState {
        self.subscriber.session_state()
    }

    /// Whether `shutdown` ran
    pub fn is_shut_down(&self) -> bool {
        self.state.is_closed()
    }

    /// Register a callback for every published view.
    ///
    /// The callback is invoked once with the current view right away. It may
    /// see a view twice, and always ends on the latest one. It runs outside the
    /// state lock, so it may read the engine (`unread_count`, `current_view`),
    /// but it must not block on engine operations.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&NotificationView) + Send + Sync + 'static,
    {
        let view = self.state.view();
        let callback = Arc::new(callback);
        let observer = callback.clone();
        let handle = view.observe(move |current| observer(current));
        callback(&view.get());
        handle
    }

    /// React to an identity transition.
    pub async fn apply_identity(&self, identity: IdentityState) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.shut_down {
            tracing::debug!(?identity, "ignoring identity change after shutdown");
            return;
        }

        match identity {
            IdentityState::Resolving => {
                tracing::trace!("identity resolving, keeping current session");
            }
            IdentityState::Authenticated(id) => {
                if lifecycle.session.map(|ticket| ticket.identity) == Some(id) {
                    tracing::trace!(identity = %id, "identity unchanged");
                    return;
                }
                self.teardown(&mut lifecycle).await;
                self.begin(&mut lifecycle, id).await;
            }
            IdentityState::Anonymous => self.teardown(&mut lifecycle).await,
        }
    }

    /// Follow an identity signal until its source is dropped, then shut down.
    pub async fn run(&self, mut watcher: IdentityWatcher) {
        match watcher.wait_resolved().await {
            Some(identity) => self.apply_identity(identity).await,
            None => {
                self.shutdown().await;
                return;
            }
        }

        while let Some(identity) = watcher.changed().await {
            self.apply_identity(identity).await;
        }

        tracing::debug!(namespace = %self.namespace(), "identity source dropped");
        self.shutdown().await;
    }

    /// Reload the snapshot of the active session.
    ///
    /// Also reopens the live channel if reconnects were exhausted.
    pub async fn refresh(&self) -> Result<InitializeSummary, NotifyError> {
        let ticket = self
            .state
            .current_session()
            .ok_or(AuthorizationError::NoIdentity)?;

        let rows = match self.loader.load(ticket.identity).await {
            Ok(rows) => rows,
            Err(error) => {
                self.state
                    .warn(&ticket, EngineWarning::SnapshotUnavailable(error.clone()));
                return Err(error.into());
            }
        };
        let summary = self.state.initialize(&ticket, rows).unwrap_or_default();
        tracing::debug!(
            identity = %ticket.identity,
            inserted = summary.inserted,
            marked_read = summary.marked_read,
            "snapshot refreshed"
        );

        let lifecycle = self.lifecycle.lock().await;
        if lifecycle.session == Some(ticket) && self.subscriber.start(ticket).await {
            tracing::info!(identity = %ticket.identity, "change feed reopened by refresh");
        }
        Ok(summary)
    }

    /// Mark one notification read (optimistic, retried, never rolled back).
    pub async fn mark_read(&self, id: NotificationId) -> Result<ReadOutcome, AuthorizationError> {
        self.coordinator.mark_read(id).await
    }

    /// Mark all notifications of `identity` read.
    pub async fn mark_all_read(
        &self,
        identity: IdentityId,
    ) -> Result<ReadOutcome, AuthorizationError> {
        self.coordinator.mark_all_read(identity).await
    }

    /// Dismiss the warning shown in the view. Returns whether one was shown.
    pub fn dismiss_warning(&self) -> bool {
        let Some(ticket) = self.state.current_session() else {
            return false;
        };
        self.state.clear_warning(&ticket)
    }

    /// End the active session and refuse further identity changes.
    pub async fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.shut_down {
            return;
        }
        self.teardown(&mut lifecycle).await;
        lifecycle.shut_down = true;
        self.state.close();
        tracing::info!(namespace = %self.namespace(), "notification engine shut down");
    }

    async fn begin(&self, lifecycle: &mut Lifecycle, identity: IdentityId) {
        let ticket = self.state.begin_session(identity);
        tracing::info!(
            %identity,
            namespace = %self.namespace(),
            epoch = %ticket.epoch,
            "notification session started"
        );

        let tasks = TaskRegistry::new();
        let loader = self.loader.clone();
        let state = self.state.clone();
        tasks.spawn_cancellable(async move {
            match loader.load_with_retry(identity).await {
                Ok(rows) => {
                    state.initialize(&ticket, rows);
                }
                Err(error) => {
                    state.snapshot_failed(&ticket, error);
                }
            }
        });
        self.subscriber.start(ticket).await;

        lifecycle.session = Some(ticket);
        lifecycle.tasks = Some(tasks);
    }

    async fn teardown(&self, lifecycle: &mut Lifecycle) {
        let Some(ticket) = lifecycle.session.take() else {
            return;
        };
        self.state.end_session();
        if let Some(tasks) = lifecycle.tasks.take() {
            tasks.shutdown().await;
        }
        self.subscriber.stop().await;
        tracing::info!(
            identity = %ticket.identity,
            epoch = %ticket.epoch,
            "notification session ended"
        );
    }
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEngine")
            .field("namespace", &self.config.namespace)
            .field("state", &self.state)
            .field("subscriber", &self.subscriber)
            .finish_non_exhaustive()
    }
}
