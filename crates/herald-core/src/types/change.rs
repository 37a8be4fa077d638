//! Change feed events
//!
//! The live channel delivers row-level change events. Rows stay raw JSON until the
//! subscriber decodes them, so a malformed row can be skipped without tearing the
//! channel down.

use crate::{HeraldError, Namespace, Notification};
use serde::{Deserialize, Serialize};

/// Kind of row-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// A new row was inserted
    Insert,
    /// An existing row was updated
    Update,
    /// A row was deleted
    Delete,
}

/// A single change event as received from the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Namespace the change belongs to
    pub namespace: Namespace,
    /// Kind of change
    pub kind: ChangeKind,
    /// The new row (for deletes, the old row)
    pub row: serde_json::Value,
}

impl ChangeEvent {
    /// Build an insert event carrying a full notification row.
    pub fn insert(namespace: Namespace, notification: &Notification) -> Result<Self, HeraldError> {
        Ok(Self {
            namespace,
            kind: ChangeKind::Insert,
            row: serde_json::to_value(notification)?,
        })
    }

    /// Whether this is an insert event
    #[must_use]
    pub fn is_insert(&self) -> bool {
        self.kind == ChangeKind::Insert
    }

    /// Decode the carried row into a notification
    pub fn decode(&self) -> Result<Notification, HeraldError> {
        Notification::from_row(&self.row)
    }
}
