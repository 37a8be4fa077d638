//! Notification namespaces
//!
//! The application keeps two notification feeds with identical semantics: the
//! general feed and the forum feed. One engine design serves both; the namespace
//! only selects the backing collection.

use crate::HeraldError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Platform-wide notifications (courses, enrolments, system messages)
    #[default]
    General,
    /// Community forum notifications (replies, mentions)
    Forum,
}

impl Namespace {
    /// All known namespaces
    pub const ALL: [Namespace; 2] = [Namespace::General, Namespace::Forum];

    /// Name of the backing collection in the store-of-record
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            Self::General => "notifications",
            Self::Forum => "forum_notifications",
        }
    }

    /// Short label for logging
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Forum => "forum",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Namespace {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" | "notifications" => Ok(Self::General),
            "forum" | "forum_notifications" => Ok(Self::Forum),
            other => Err(HeraldError::invalid(format!("unknown namespace '{other}'"))),
        }
    }
}
