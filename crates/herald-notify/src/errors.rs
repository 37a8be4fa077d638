//! Categorized engine errors
//!
//! Every failure the engine can observe is recoverable from the host's point of
//! view. Errors are caught at component boundaries and turned into either a
//! returned value or an [`EngineWarning`] recorded in the published view; none of
//! them are allowed to tear down the host.

use herald_core::{HeraldError, IdentityId, NotificationId};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Error Categories
// ============================================================================

/// High-level error categories for presentation-layer handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Snapshot could not be loaded
    Retrieval,
    /// Read-state could not be persisted
    Persistence,
    /// Live channel transport failure
    Channel,
    /// Missing or mismatched identity
    Authorization,
}

/// How prominently a warning should be shown
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Informational, may be hidden
    Info,
    /// Non-blocking warning (toast, banner)
    Warning,
    /// Requires user action
    Error,
}

impl ErrorCategory {
    /// Whether the engine can recover without user action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Authorization)
    }

    /// Suggested severity for UI routing.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Retrieval => Severity::Warning,
            Self::Persistence => Severity::Warning,
            Self::Channel => Severity::Info,
            Self::Authorization => Severity::Error,
        }
    }

    /// Short label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retrieval => "Retrieval",
            Self::Persistence => "Persistence",
            Self::Channel => "Channel",
            Self::Authorization => "Authorization",
        }
    }

    /// User-facing hint on what happens next.
    #[must_use]
    pub fn resolution_hint(&self) -> &'static str {
        match self {
            Self::Retrieval => "Older notifications could not be loaded; pull to refresh",
            Self::Persistence => "Read state is saved on this device only for now",
            Self::Channel => "Reconnecting to live updates",
            Self::Authorization => "Sign in to see notifications",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Component Errors
// ============================================================================

/// Snapshot load failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    /// The backend did not answer within the configured bound
    #[error("snapshot load timed out after {}ms", timeout.as_millis())]
    Timeout {
        /// Configured bound
        timeout: Duration,
    },
    /// The backend answered with an error
    #[error("snapshot load failed: {0}")]
    Backend(#[source] HeraldError),
}

impl RetrievalError {
    /// Whether a retry may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Backend(err) => err.is_transient(),
        }
    }
}

/// What a read-state write was trying to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistTarget {
    /// One notification
    Single(NotificationId),
    /// The previously-unread set of one identity
    Bulk {
        /// Owner of the set
        owner: IdentityId,
        /// Number of notifications in the set
        count: usize,
    },
}

impl fmt::Display for PersistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(id) => write!(f, "notification {id}"),
            Self::Bulk { owner, count } => write!(f, "{count} notification(s) of {owner}"),
        }
    }
}

/// Read-state persistence failed after all retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to persist read state for {target} after {attempts} attempt(s): {source}")]
pub struct PersistenceError {
    /// What was being persisted
    pub target: PersistTarget,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Last backend error
    pub source: HeraldError,
}

/// Live channel failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Opening the channel failed
    #[error("failed to open change feed: {0}")]
    Connect(#[source] HeraldError),
    /// The open channel reported an error
    #[error("change feed transport failed: {0}")]
    Transport(#[source] HeraldError),
    /// The transport closed the channel
    #[error("change feed closed by transport")]
    Closed,
    /// Reconnect policy exhausted
    #[error("gave up reconnecting after {attempts} attempt(s)")]
    Exhausted {
        /// Reconnect attempts made
        attempts: u32,
    },
}

/// Missing or invalid identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// No identity is signed in
    #[error("no identity is signed in")]
    NoIdentity,
    /// The caller named a different identity than the active session
    #[error("identity {requested} does not own the active session ({active})")]
    IdentityMismatch {
        /// Identity named by the caller
        requested: IdentityId,
        /// Identity of the active session
        active: IdentityId,
    },
}

/// Any engine error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// Snapshot load failed
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    /// Read-state persistence failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// Live channel failure
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Missing or invalid identity
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

impl NotifyError {
    /// Category for UI routing
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Retrieval(_) => ErrorCategory::Retrieval,
            Self::Persistence(_) => ErrorCategory::Persistence,
            Self::Channel(_) => ErrorCategory::Channel,
            Self::Authorization(_) => ErrorCategory::Authorization,
        }
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Non-blocking, UI-visible warning recorded in the published view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineWarning {
    /// The snapshot could not be loaded; the list may be incomplete
    SnapshotUnavailable(RetrievalError),
    /// Read-state is kept locally but was not saved
    ReadStateNotSaved(PersistenceError),
    /// The live channel dropped and is being re-established
    ChannelInterrupted {
        /// Reconnect attempt in progress
        attempt: u32,
        /// Failure that interrupted the channel
        error: ChannelError,
    },
}

impl EngineWarning {
    /// Category of the underlying failure
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SnapshotUnavailable(_) => ErrorCategory::Retrieval,
            Self::ReadStateNotSaved(_) => ErrorCategory::Persistence,
            Self::ChannelInterrupted { .. } => ErrorCategory::Channel,
        }
    }

    /// Human-readable message for display
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::SnapshotUnavailable(err) => err.to_string(),
            Self::ReadStateNotSaved(err) => err.to_string(),
            Self::ChannelInterrupted { attempt, error } => {
                format!("{error} (reconnect attempt {attempt})")
            }
        }
    }
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authorization_is_unrecoverable() {
        assert!(ErrorCategory::Retrieval.is_recoverable());
        assert!(ErrorCategory::Persistence.is_recoverable());
        assert!(ErrorCategory::Channel.is_recoverable());
        assert!(!ErrorCategory::Authorization.is_recoverable());
    }

    #[test]
    fn test_retrieval_transience() {
        let timeout = RetrievalError::Timeout {
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_transient());
        assert_eq!(timeout.to_string(), "snapshot load timed out after 10000ms");
        assert!(!RetrievalError::Backend(HeraldError::permission_denied("rls")).is_transient());
    }

    #[test]
    fn test_notify_error_category() {
        let err: NotifyError = AuthorizationError::NoIdentity.into();
        assert_eq!(err.category(), ErrorCategory::Authorization);
        assert_eq!(err.to_string(), "no identity is signed in");
    }

    #[test]
    fn test_warning_message_mentions_target() {
        let id = NotificationId::from_seed(b"n");
        let warning = EngineWarning::ReadStateNotSaved(PersistenceError {
            target: PersistTarget::Single(id),
            attempts: 4,
            source: HeraldError::network("offline"),
        });
        assert_eq!(warning.category(), ErrorCategory::Persistence);
        assert!(warning.message().contains(&id.to_string()));
        assert!(warning.message().contains("4 attempt(s)"));
    }
}
