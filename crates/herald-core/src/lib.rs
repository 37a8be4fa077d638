//! Herald Core - Foundation for the notification engine
//!
//! This crate provides the types and interfaces every other Herald crate builds on.
//! It contains no engine logic: the store, the change feed and the read-state
//! coordinator live in `herald-notify`.
//!
//! # Contents
//!
//! ## Identity and Records
//! - [`IdentityId`], [`NotificationId`]: opaque identifiers
//! - [`Notification`]: the record shape and its ordering key
//! - [`Namespace`]: logical notification category (general feed, forum feed)
//!
//! ## Effect Interfaces
//! - [`effects::NotificationBackend`]: snapshot fetch, read-state writes, change feed
//! - [`identity::IdentitySource`]: explicit identity-resolution signal
//!
//! ## Runtime Primitives
//! - [`reactive`]: `Dynamic<T>` values with poll subscriptions and callback observers
//! - [`reliability`]: retry policies with exponential, jittered, capped backoff
//! - [`config`]: configuration loading, merging and validation

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Identity and notification identifiers
pub mod identifiers;

/// Notification records, namespaces and change events
pub mod types;

/// Backend effect interfaces (no implementations)
pub mod effects;

/// Identity resolution signal
pub mod identity;

/// Reactive values and observers
pub mod reactive;

/// Retry and backoff
pub mod reliability;

/// Configuration traits and validation
pub mod config;

pub use errors::{HeraldError, Result};
pub use identifiers::{IdentityId, NotificationId};
pub use identity::{IdentitySource, IdentityState, IdentityWatcher};
pub use types::{ChangeEvent, ChangeKind, Namespace, Notification};
