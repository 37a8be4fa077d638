//! # Notification Record
//!
//! The row shape shared by snapshots and live change events. Field names on the
//! wire follow the store-of-record's columns (`user_id`, `type`, `data`), while the
//! Rust names describe what the fields mean.

use crate::{HeraldError, IdentityId, NotificationId};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

/// A notification delivered to one identity.
///
/// `created_at` (ms since epoch) is the ordering key; the canonical order is
/// newest first, ties broken by id so that ordering is total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id assigned by the store-of-record
    pub id: NotificationId,
    /// Owning identity
    #[serde(rename = "user_id")]
    pub owner: IdentityId,
    /// Type tag (e.g. `course_enrolled`, `post_reply`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Short title
    pub title: String,
    /// Optional body text
    #[serde(default)]
    pub message: Option<String>,
    /// Optional deep-link target inside the application
    #[serde(default)]
    pub link: Option<String>,
    /// Optional opaque structured payload
    #[serde(default, rename = "data")]
    pub payload: Option<serde_json::Value>,
    /// Whether the owner has read this notification
    #[serde(default)]
    pub is_read: bool,
    /// Creation time (ms since epoch)
    #[serde(deserialize_with = "deserialize_timestamp_ms")]
    pub created_at: u64,
}

impl Notification {
    /// Create an unread notification with no optional fields set.
    pub fn new(
        id: NotificationId,
        owner: IdentityId,
        kind: impl Into<String>,
        title: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            owner,
            kind: kind.into(),
            title: title.into(),
            message: None,
            link: None,
            payload: None,
            is_read: false,
            created_at,
        }
    }

    /// Set the body text
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the deep-link target
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the structured payload
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Mark as already read
    #[must_use]
    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }

    /// Whether this notification still counts towards the unread aggregate
    #[must_use]
    pub fn is_unread(&self) -> bool {
        !self.is_read
    }

    /// Decode a raw row as delivered by the change feed.
    pub fn from_row(row: &serde_json::Value) -> Result<Self, HeraldError> {
        Self::deserialize(row)
            .map_err(|e| HeraldError::serialization(format!("undecodable notification row: {e}")))
    }

    /// Canonical ordering: newest first, then by id (descending) for ties.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Accept either integer milliseconds or an RFC 3339 string.
fn deserialize_timestamp_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(u64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => Ok(ms),
        RawTimestamp::Text(text) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(&text)
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{text}': {e}")))?;
            u64::try_from(parsed.timestamp_millis())
                .map_err(|_| serde::de::Error::custom(format!("timestamp before epoch: {text}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner() -> IdentityId {
        IdentityId::from_seed(b"owner")
    }

    #[test]
    fn test_decode_row_with_millis() {
        let id = NotificationId::from_seed(b"n1");
        let row = json!({
            "id": id.to_string(),
            "user_id": owner().to_string(),
            "type": "post_reply",
            "title": "New reply",
            "message": "Someone replied to your post",
            "link": "/forum/posts/42",
            "data": { "post_id": 42 },
            "is_read": false,
            "created_at": 1_700_000_000_000u64,
        });

        let n = Notification::from_row(&row).unwrap();
        assert_eq!(n.id, id);
        assert_eq!(n.owner, owner());
        assert_eq!(n.kind, "post_reply");
        assert_eq!(n.link.as_deref(), Some("/forum/posts/42"));
        assert_eq!(n.payload, Some(json!({ "post_id": 42 })));
        assert_eq!(n.created_at, 1_700_000_000_000);
        assert!(n.is_unread());
    }

    #[test]
    fn test_decode_row_with_rfc3339_and_defaults() {
        let row = json!({
            "id": NotificationId::from_seed(b"n2").to_string(),
            "user_id": owner().to_string(),
            "type": "course_enrolled",
            "title": "Welcome",
            "created_at": "2023-11-14T22:13:20Z",
        });

        let n = Notification::from_row(&row).unwrap();
        assert_eq!(n.created_at, 1_700_000_000_000);
        assert!(n.message.is_none());
        assert!(n.payload.is_none());
        assert!(!n.is_read);
    }

    #[test]
    fn test_decode_rejects_missing_owner() {
        let row = json!({
            "id": NotificationId::from_seed(b"n3").to_string(),
            "type": "x",
            "title": "x",
            "created_at": 1,
        });
        assert!(matches!(
            Notification::from_row(&row),
            Err(HeraldError::Serialization { .. })
        ));
    }

    #[test]
    fn test_canonical_order_newest_first() {
        let older = Notification::new(NotificationId::from_seed(b"a"), owner(), "t", "a", 1);
        let newer = Notification::new(NotificationId::from_seed(b"b"), owner(), "t", "b", 2);
        let mut list = vec![older.clone(), newer.clone()];
        list.sort_by(Notification::canonical_cmp);
        assert_eq!(list, vec![newer, older]);
    }
}
