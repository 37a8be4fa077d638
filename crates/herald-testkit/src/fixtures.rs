//! Deterministic identities and notifications

use herald_core::{IdentityId, Notification, NotificationId};

/// Identity derived from a label
pub fn identity(label: &str) -> IdentityId {
    IdentityId::from_seed(label.as_bytes())
}

/// Notification id derived from a label
pub fn notification_id(label: &str) -> NotificationId {
    NotificationId::from_seed(label.as_bytes())
}

/// Unread notification with id `label`, owned by `owner`
pub fn notification(owner: IdentityId, label: &str, created_at: u64) -> Notification {
    Notification::new(
        notification_id(label),
        owner,
        "system",
        format!("Notification {label}"),
        created_at,
    )
}

/// `count` unread notifications labelled `{prefix}-{i}`, created at `1..=count`
pub fn notification_batch(owner: IdentityId, prefix: &str, count: usize) -> Vec<Notification> {
    (1..=count)
        .map(|i| notification(owner, &format!("{prefix}-{i}"), i as u64))
        .collect()
}

/// Builder for notifications with optional fields
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    notification: Notification,
}

impl NotificationBuilder {
    /// Start from an unread notification
    pub fn new(owner: IdentityId, label: &str) -> Self {
        Self {
            notification: notification(owner, label, 0),
        }
    }

    /// Creation time
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.notification.created_at = created_at;
        self
    }

    /// Type tag
    pub fn kind(mut self, kind: &str) -> Self {
        self.notification.kind = kind.to_string();
        self
    }

    /// Mark read
    pub fn read(mut self) -> Self {
        self.notification.is_read = true;
        self
    }

    /// Deep link
    pub fn link(mut self, link: &str) -> Self {
        self.notification = self.notification.with_link(link);
        self
    }

    /// Body text
    pub fn message(mut self, message: &str) -> Self {
        self.notification = self.notification.with_message(message);
        self
    }

    /// Finish
    pub fn build(self) -> Notification {
        self.notification
    }
}
