//! Core identifier types
//!
//! Identifiers are opaque UUID newtypes. They serialize as plain UUID strings so
//! they round-trip through the store-of-record's rows unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::HeraldError;

/// Identity of the current principal/session.
///
/// Stable for the lifetime of a sign-in; every notification is owned by exactly
/// one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    /// Create a new random identity ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a deterministic identity ID from seed bytes (tests, simulations)
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed))
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| HeraldError::invalid(format!("invalid identity id '{s}': {e}")))
    }
}

impl From<Uuid> for IdentityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<IdentityId> for Uuid {
    fn from(id: IdentityId) -> Self {
        id.0
    }
}

/// Notification identifier, assigned by the store-of-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    /// Create a new random notification ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a deterministic notification ID from seed bytes (tests, simulations)
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, seed))
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NotificationId {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| HeraldError::invalid(format!("invalid notification id '{s}': {e}")))
    }
}

impl From<Uuid> for NotificationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_ids_are_deterministic() {
        assert_eq!(IdentityId::from_seed(b"alice"), IdentityId::from_seed(b"alice"));
        assert_ne!(IdentityId::from_seed(b"alice"), IdentityId::from_seed(b"bob"));
        assert_eq!(
            NotificationId::from_seed(b"n-1"),
            NotificationId::from_seed(b"n-1")
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = NotificationId::generate();
        let parsed: NotificationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<IdentityId>().is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = IdentityId::from_seed(b"alice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.uuid()));
    }
}
