//! Published notification view

use crate::errors::EngineWarning;
use herald_core::{IdentityId, Namespace, Notification};

/// Connection and loading status shown to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// No identity signed in
    #[default]
    Idle,
    /// Snapshot load in flight
    Loading,
    /// Snapshot settled, live channel still opening
    Connecting,
    /// Snapshot settled and live channel open
    Live,
    /// Live channel dropped, reconnect pending
    Reconnecting {
        /// Reconnect attempt in progress (1-based)
        attempt: u32,
    },
    /// Reconnect policy exhausted; only `refresh` updates the list
    Offline,
    /// Engine shut down
    Closed,
}

impl FeedStatus {
    /// Whether live events are currently flowing
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Immutable view of the store published after every transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationView {
    /// Namespace the engine serves
    pub namespace: Namespace,
    /// Identity of the active session
    pub identity: Option<IdentityId>,
    /// Notifications, newest first
    pub notifications: Vec<Notification>,
    /// Number of unread notifications
    pub unread_count: usize,
    /// Loading and channel status
    pub status: FeedStatus,
    /// Most recent non-blocking warning, cleared on the next session
    pub warning: Option<EngineWarning>,
}

impl NotificationView {
    /// Empty view for a namespace
    pub fn empty(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Self::default()
        }
    }

    /// Number of notifications in the view
    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    /// Whether the view holds no notifications
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Whether there is anything to badge
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}
