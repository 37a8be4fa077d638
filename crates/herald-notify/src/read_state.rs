//! Read-state coordinator
//!
//! Optimistic read-state changes: the store flips first and the view is
//! republished before the backend write starts. The write is retried on
//! transient failures; when retries run out the local state is kept (no
//! rollback) and a warning is recorded in the view.
//!
//! Only the first call for an id persists it, so concurrent `mark_read` calls
//! for the same id decrement the unread count once and issue at most one write.
//! An id that is not stored yet is still written; the store remembers it and
//! shows the row read once it arrives.

use crate::config::EngineConfig;
use crate::errors::{AuthorizationError, EngineWarning, PersistTarget, PersistenceError};
use crate::state::{NotificationState, SessionTicket};
use crate::store::ReadMark;
use herald_core::effects::NotificationBackend;
use herald_core::reliability::{RetryPolicy, RetryResult};
use herald_core::{HeraldError, IdentityId, Namespace, NotificationId};
use std::sync::Arc;

/// Result of a read-state request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Local change applied and saved
    Persisted {
        /// Number of notifications changed
        changed: usize,
        /// Backend attempts, including the first
        attempts: u32,
    },
    /// Nothing to change locally; no write was issued
    Unchanged,
    /// Local change applied but not saved
    LocalOnly(PersistenceError),
}

impl ReadOutcome {
    /// Whether the backend has the new state
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    /// Number of notifications flipped locally
    #[must_use]
    pub fn changed(&self) -> usize {
        match self {
            Self::Persisted { changed, .. } => *changed,
            Self::Unchanged => 0,
            Self::LocalOnly(err) => match err.target {
                PersistTarget::Single(_) => 1,
                PersistTarget::Bulk { count, .. } => count,
            },
        }
    }
}

/// Applies read-state locally and persists it with bounded retries
#[derive(Clone)]
pub struct ReadStateCoordinator {
    backend: Arc<dyn NotificationBackend>,
    namespace: Namespace,
    state: NotificationState,
    retry: RetryPolicy,
}

impl ReadStateCoordinator {
    /// Coordinator writing into `state`
    pub fn new(
        backend: Arc<dyn NotificationBackend>,
        state: NotificationState,
        config: &EngineConfig,
    ) -> Self {
        Self {
            backend,
            namespace: config.namespace,
            state,
            retry: config.persistence_policy(),
        }
    }

    /// Mark one notification read.
    pub async fn mark_read(&self, id: NotificationId) -> Result<ReadOutcome, AuthorizationError> {
        let ticket = self
            .state
            .current_session()
            .ok_or(AuthorizationError::NoIdentity)?;

        let mark = self.state.set_read(&ticket, id).unwrap_or(ReadMark::AlreadyRead);
        if !mark.needs_persist() {
            tracing::trace!(%id, "mark_read: already read");
            return Ok(ReadOutcome::Unchanged);
        }
        let changed = usize::from(mark == ReadMark::Flipped);

        let backend = &self.backend;
        let namespace = self.namespace;
        let result = self
            .retry
            .execute_while(move || backend.set_read(namespace, id), HeraldError::is_transient)
            .await;

        Ok(self.settle(&ticket, PersistTarget::Single(id), changed, result))
    }

    /// Mark every notification of `identity` read.
    ///
    /// Only the notifications that were unread locally are written.
    pub async fn mark_all_read(
        &self,
        identity: IdentityId,
    ) -> Result<ReadOutcome, AuthorizationError> {
        let ticket = self
            .state
            .current_session()
            .ok_or(AuthorizationError::NoIdentity)?;
        if ticket.identity != identity {
            return Err(AuthorizationError::IdentityMismatch {
                requested: identity,
                active: ticket.identity,
            });
        }

        let ids = self.state.set_all_read(&ticket).unwrap_or_default();
        if ids.is_empty() {
            return Ok(ReadOutcome::Unchanged);
        }

        let backend = &self.backend;
        let namespace = self.namespace;
        let scope: &[NotificationId] = &ids;
        let result = self
            .retry
            .execute_while(
                move || backend.set_all_read(namespace, identity, scope),
                HeraldError::is_transient,
            )
            .await;

        let target = PersistTarget::Bulk {
            owner: identity,
            count: ids.len(),
        };
        Ok(self.settle(&ticket, target, ids.len(), result))
    }

    fn settle(
        &self,
        ticket: &SessionTicket,
        target: PersistTarget,
        changed: usize,
        result: RetryResult<(), HeraldError>,
    ) -> ReadOutcome {
        let attempts = result.attempts;
        match result.result {
            Ok(()) => {
                tracing::debug!(%target, attempts, "read state persisted");
                ReadOutcome::Persisted { changed, attempts }
            }
            Err(source) => {
                let error = PersistenceError {
                    target,
                    attempts,
                    source,
                };
                tracing::warn!(%error, "read state kept locally only");
                self.state
                    .warn(ticket, EngineWarning::ReadStateNotSaved(error.clone()));
                ReadOutcome::LocalOnly(error)
            }
        }
    }
}

impl std::fmt::Debug for ReadStateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStateCoordinator")
            .field("namespace", &self.namespace)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
