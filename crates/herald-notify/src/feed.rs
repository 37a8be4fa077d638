//! Change feed subscriber
//!
//! Owns the live channel of one session. At most one channel is open at a time:
//! `start` for a new session stops the previous channel (and waits for its
//! worker to exit) before opening the next one. After `stop` returns, no event
//! of the stopped channel reaches the store.
//!
//! The worker reconnects with capped exponential backoff whenever the transport
//! errors or closes, and reloads the snapshot after each successful reconnect so
//! that rows missed while disconnected show up. The backoff only resets once a
//! channel has delivered an event or stayed open for the full backoff cap.

use crate::config::EngineConfig;
use crate::errors::{ChannelError, EngineWarning};
use crate::snapshot::SnapshotLoader;
use crate::state::{ChannelPhase, NotificationState, SessionTicket};
use crate::task_registry::TaskRegistry;
use futures::StreamExt;
use herald_core::effects::{ChangeFilter, ChangeStream, NotificationBackend};
use herald_core::reactive::Dynamic;
use herald_core::reliability::RetryPolicy;
use herald_core::{ChangeEvent, Namespace};
use std::sync::Arc;

/// Lifecycle of the live channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Never started
    #[default]
    Idle,
    /// Opening, or waiting to reopen
    Connecting,
    /// Open and delivering events
    Active,
    /// Stopped, or reconnects exhausted
    Closed,
}

struct ActiveChannel {
    ticket: SessionTicket,
    tasks: TaskRegistry,
}

enum DrainEnd {
    Interrupted { error: ChannelError, delivered: usize },
    Stale,
}

#[derive(Clone)]
struct FeedWorker {
    backend: Arc<dyn NotificationBackend>,
    namespace: Namespace,
    state: NotificationState,
    loader: SnapshotLoader,
    reconnect: RetryPolicy,
    resnapshot_on_reconnect: bool,
    session_state: Dynamic<SessionState>,
}

/// Manages the single live channel of the engine
pub struct ChangeFeedSubscriber {
    worker: FeedWorker,
    active: tokio::sync::Mutex<Option<ActiveChannel>>,
}

impl ChangeFeedSubscriber {
    /// Subscriber writing into `state`
    pub fn new(
        backend: Arc<dyn NotificationBackend>,
        state: NotificationState,
        loader: SnapshotLoader,
        config: &EngineConfig,
    ) -> Self {
        Self {
            worker: FeedWorker {
                backend,
                namespace: config.namespace,
                state,
                loader,
                reconnect: config.reconnect_policy(),
                resnapshot_on_reconnect: config.resnapshot_on_reconnect,
                session_state: Dynamic::new(SessionState::Idle),
            },
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Current channel lifecycle state
    pub fn session_state(&self) -> SessionState {
        self.worker.session_state.get()
    }

    /// Open the channel for `ticket`.
    ///
    /// Idempotent for a session whose worker is still running. Returns whether
    /// a new channel was opened.
    pub async fn start(&self, ticket: SessionTicket) -> bool {
        let mut active = self.active.lock().await;
        if let Some(channel) = active.as_ref() {
            if channel.ticket == ticket && channel.tasks.active_count() > 0 {
                tracing::debug!(identity = %ticket.identity, "change feed already running");
                return false;
            }
        }
        if let Some(previous) = active.take() {
            tracing::debug!(
                identity = %previous.ticket.identity,
                epoch = %previous.ticket.epoch,
                "closing previous change feed"
            );
            previous.tasks.shutdown().await;
        }

        let tasks = TaskRegistry::new();
        self.worker.session_state.set(SessionState::Connecting);
        tasks.spawn_cancellable(self.worker.clone().run(ticket));
        *active = Some(ActiveChannel { ticket, tasks });
        true
    }

    /// Close the channel. Returns whether one was open.
    pub async fn stop(&self) -> bool {
        let Some(channel) = self.active.lock().await.take() else {
            return false;
        };
        channel.tasks.shutdown().await;
        self.worker.session_state.set(SessionState::Closed);
        tracing::info!(identity = %channel.ticket.identity, "change feed stopped");
        true
    }
}

impl std::fmt::Debug for ChangeFeedSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeedSubscriber")
            .field("namespace", &self.worker.namespace)
            .field("session_state", &self.session_state())
            .finish_non_exhaustive()
    }
}

impl FeedWorker {
    async fn run(self, ticket: SessionTicket) {
        let filter = ChangeFilter {
            namespace: self.namespace,
            owner: ticket.identity,
        };
        let mut failures: u32 = 0;
        let mut connected_before = false;

        self.state
            .set_channel_phase(&ticket, ChannelPhase::Connecting);

        loop {
            let error = match self.backend.subscribe(filter).await {
                Ok(stream) => {
                    self.session_state.set(SessionState::Active);
                    if !self.state.set_channel_phase(&ticket, ChannelPhase::Active) {
                        return self.retire(&ticket);
                    }
                    tracing::info!(
                        identity = %ticket.identity,
                        namespace = %self.namespace,
                        reconnect = connected_before,
                        "change feed open"
                    );
                    if connected_before && self.resnapshot_on_reconnect {
                        self.resnapshot(&ticket).await;
                    }
                    connected_before = true;

                    let opened = tokio::time::Instant::now();
                    match self.drain(&ticket, stream).await {
                        DrainEnd::Interrupted { error, delivered } => {
                            // A channel that closes before proving healthy keeps backing off.
                            if delivered > 0 || opened.elapsed() >= self.reconnect.max_delay {
                                failures = 0;
                            }
                            error
                        }
                        DrainEnd::Stale => return self.retire(&ticket),
                    }
                }
                Err(error) => ChannelError::Connect(error),
            };

            self.session_state.set(SessionState::Connecting);
            failures = failures.saturating_add(1);
            if failures > self.reconnect.max_attempts {
                let attempts = failures - 1;
                tracing::warn!(
                    identity = %ticket.identity,
                    attempts,
                    %error,
                    "change feed reconnects exhausted"
                );
                self.state.set_channel_phase(&ticket, ChannelPhase::Exhausted);
                self.state.warn(
                    &ticket,
                    EngineWarning::ChannelInterrupted {
                        attempt: attempts,
                        error: ChannelError::Exhausted { attempts },
                    },
                );
                self.session_state.set(SessionState::Closed);
                return;
            }

            let delay = self.reconnect.calculate_delay(failures - 1);
            tracing::warn!(
                identity = %ticket.identity,
                attempt = failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "change feed interrupted, reconnecting"
            );
            if !self.state.channel_interrupted(&ticket, failures, error) {
                return self.retire(&ticket);
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn drain(&self, ticket: &SessionTicket, mut stream: ChangeStream) -> DrainEnd {
        let mut delivered = 0;
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if !self.apply(ticket, event) {
                        return DrainEnd::Stale;
                    }
                    delivered += 1;
                }
                Err(error) => {
                    return DrainEnd::Interrupted {
                        error: ChannelError::Transport(error),
                        delivered,
                    }
                }
            }
        }
        DrainEnd::Interrupted {
            error: ChannelError::Closed,
            delivered,
        }
    }

    /// Returns `false` once the session is no longer current.
    fn apply(&self, ticket: &SessionTicket, event: ChangeEvent) -> bool {
        if event.namespace != self.namespace {
            tracing::trace!(namespace = %event.namespace, "ignoring change for other namespace");
            return true;
        }
        if !event.is_insert() {
            tracing::trace!(kind = ?event.kind, "ignoring non-insert change");
            return true;
        }
        let notification = match event.decode() {
            Ok(notification) => notification,
            Err(error) => {
                tracing::warn!(%error, "skipping undecodable change event");
                return true;
            }
        };
        if notification.owner != ticket.identity {
            tracing::warn!(
                id = %notification.id,
                owner = %notification.owner,
                "dropping change event addressed to another identity"
            );
            return true;
        }

        match self.state.merge(ticket, notification) {
            Some(outcome) => {
                tracing::trace!(?outcome, "change merged");
                true
            }
            None => false,
        }
    }

    async fn resnapshot(&self, ticket: &SessionTicket) {
        match self.loader.load(ticket.identity).await {
            Ok(rows) => {
                if let Some(summary) = self.state.initialize(ticket, rows) {
                    tracing::debug!(
                        inserted = summary.inserted,
                        marked_read = summary.marked_read,
                        "snapshot reloaded after reconnect"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(%error, "snapshot reload after reconnect failed");
                self.state
                    .warn(ticket, EngineWarning::SnapshotUnavailable(error));
            }
        }
    }

    fn retire(&self, ticket: &SessionTicket) {
        tracing::debug!(epoch = %ticket.epoch, "change feed worker outlived its session");
        self.session_state.set(SessionState::Closed);
    }
}
