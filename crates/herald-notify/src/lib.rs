//! Herald Notify - realtime notification engine
//!
//! Keeps a per-identity list of notifications in sync with the store-of-record:
//! a bounded snapshot on sign-in, a filtered live change feed merged in arrival
//! order, and optimistic read-state changes persisted with bounded retries.
//!
//! # Components
//!
//! - [`NotificationStore`]: ordered, deduplicated collection with an unread counter
//! - [`NotificationState`]: session-fenced shared store with a published view
//! - [`SnapshotLoader`]: bounded, time-limited snapshot reads
//! - [`ChangeFeedSubscriber`]: single live channel with reconnect and re-snapshot
//! - [`ReadStateCoordinator`]: optimistic `mark_read` / `mark_all_read`
//! - [`NotificationEngine`]: identity-driven lifecycle tying the above together
//!
//! # Example
//!
//! ```ignore
//! let engine = NotificationEngine::new(backend, EngineConfig::default());
//! let _handle = engine.observe(|view| render(view));
//! engine.run(identity_source.watch()).await;
//! ```

#![forbid(unsafe_code)]

/// Engine configuration
pub mod config;

/// Identity-driven engine lifecycle
pub mod engine;

/// Categorized errors and warnings
pub mod errors;

/// Live change feed subscriber
pub mod feed;

/// Optimistic read-state coordination
pub mod read_state;

/// Bounded snapshot loading
pub mod snapshot;

/// Session-fenced shared state
pub mod state;

/// Ordered notification store
pub mod store;

/// Per-session background tasks
pub mod task_registry;

/// Published view types
pub mod view;

pub use config::EngineConfig;
pub use engine::NotificationEngine;
pub use errors::{
    AuthorizationError, ChannelError, EngineWarning, ErrorCategory, NotifyError,
    PersistTarget, PersistenceError, RetrievalError, Severity,
};
pub use feed::{ChangeFeedSubscriber, SessionState};
pub use read_state::{ReadOutcome, ReadStateCoordinator};
pub use snapshot::SnapshotLoader;
pub use state::{ChannelPhase, NotificationState, SessionEpoch, SessionTicket};
pub use store::{InitializeSummary, MergeOutcome, NotificationStore, ReadMark};
pub use task_registry::TaskRegistry;
pub use view::{FeedStatus, NotificationView};
