//! Notification backend effects
//!
//! Pure interface to the store-of-record: a bounded snapshot read, read-state
//! writes, and a filtered change feed. Implementations live outside this crate
//! (hosted database adapters, the in-memory testkit backend).

use crate::{ChangeEvent, HeraldError, IdentityId, Namespace, Notification, NotificationId};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of change events for one subscription.
///
/// The stream ending (or yielding an error) means the transport disconnected;
/// consumers are expected to reconnect.
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent, HeraldError>>;

/// Sort direction for snapshot reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first
    #[default]
    Descending,
    /// Oldest first
    Ascending,
}

/// Bounded snapshot query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    /// Collection to read from
    pub namespace: Namespace,
    /// Owner whose notifications are read
    pub owner: IdentityId,
    /// Maximum number of rows
    pub limit: usize,
    /// Ordering by creation time
    pub order: SortOrder,
}

impl FetchQuery {
    /// Most recent `limit` notifications of `owner`
    pub fn most_recent(namespace: Namespace, owner: IdentityId, limit: usize) -> Self {
        Self {
            namespace,
            owner,
            limit,
            order: SortOrder::Descending,
        }
    }
}

/// Filter for a change feed subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeFilter {
    /// Collection to watch
    pub namespace: Namespace,
    /// Only rows owned by this identity
    pub owner: IdentityId,
}

/// Store-of-record operations used by the notification engine
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Read a bounded page of notifications.
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Notification>, HeraldError>;

    /// Persist the read flag of a single notification.
    async fn set_read(&self, namespace: Namespace, id: NotificationId) -> Result<(), HeraldError>;

    /// Persist the read flag of every listed notification owned by `owner`.
    async fn set_all_read(
        &self,
        namespace: Namespace,
        owner: IdentityId,
        ids: &[NotificationId],
    ) -> Result<(), HeraldError>;

    /// Open a live change feed channel.
    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream, HeraldError>;
}
