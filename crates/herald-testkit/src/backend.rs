//! In-memory notification backend
//!
//! Deterministic stand-in for the store-of-record. Rows live in memory per
//! namespace, change feeds are unbounded channels filtered by namespace and
//! owner, and every operation can be made to fail on demand.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use herald_core::effects::{
    ChangeFilter, ChangeStream, FetchQuery, NotificationBackend, SortOrder,
};
use herald_core::{
    ChangeEvent, HeraldError, IdentityId, Namespace, Notification, NotificationId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

type EventSender = mpsc::UnboundedSender<Result<ChangeEvent, HeraldError>>;

/// A read-state write observed by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRecord {
    /// `set_read`
    Single {
        /// Target namespace
        namespace: Namespace,
        /// Notification written
        id: NotificationId,
    },
    /// `set_all_read`
    Bulk {
        /// Target namespace
        namespace: Namespace,
        /// Owner of the rows
        owner: IdentityId,
        /// Rows in scope
        ids: Vec<NotificationId>,
    },
}

struct Subscriber {
    filter: ChangeFilter,
    tx: EventSender,
}

#[derive(Default)]
struct Faults {
    fetch: VecDeque<HeraldError>,
    fetch_delay: Option<Duration>,
    write: VecDeque<HeraldError>,
    write_always: Option<HeraldError>,
    subscribe: VecDeque<HeraldError>,
    close_on_open: bool,
}

#[derive(Default)]
struct BackendState {
    rows: HashMap<Namespace, Vec<Notification>>,
    subscribers: Vec<Subscriber>,
    faults: Faults,
    writes: Vec<WriteRecord>,
    write_attempts: usize,
    fetches: usize,
    subscribes: usize,
}

impl BackendState {
    fn prune(&mut self) {
        self.subscribers.retain(|s| !s.tx.is_closed());
    }

    fn deliver(&mut self, filter: ChangeFilter, event: &ChangeEvent) -> usize {
        self.prune();
        let mut delivered = 0;
        for subscriber in self.subscribers.iter().filter(|s| s.filter == filter) {
            if subscriber.tx.unbounded_send(Ok(event.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn next_write_fault(&mut self) -> Option<HeraldError> {
        self.write_attempts += 1;
        self.faults
            .write
            .pop_front()
            .or_else(|| self.faults.write_always.clone())
    }
}

/// In-memory backend with fault injection
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle usable as the engine backend
    pub fn shared(&self) -> Arc<dyn NotificationBackend> {
        Arc::new(self.clone())
    }

    /// Store rows without notifying subscribers
    pub fn seed(&self, namespace: Namespace, rows: impl IntoIterator<Item = Notification>) {
        let mut state = self.state.lock();
        state.rows.entry(namespace).or_default().extend(rows);
    }

    /// Store a row and deliver an insert event to matching subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn insert(&self, namespace: Namespace, notification: Notification) -> usize {
        let filter = ChangeFilter {
            namespace,
            owner: notification.owner,
        };
        let event = match ChangeEvent::insert(namespace, &notification) {
            Ok(event) => event,
            Err(error) => {
                tracing::error!(%error, "failed to encode notification row");
                return 0;
            }
        };
        let mut state = self.state.lock();
        state.rows.entry(namespace).or_default().push(notification);
        state.deliver(filter, &event)
    }

    /// Deliver a raw event to the subscribers of `filter` without storing anything
    pub fn push_event(&self, filter: ChangeFilter, event: ChangeEvent) -> usize {
        self.state.lock().deliver(filter, &event)
    }

    /// End every open change feed (stream returns `None`)
    pub fn disconnect_all(&self) {
        self.state.lock().subscribers.clear();
    }

    /// Fail every open change feed with `error`, then end it
    pub fn fail_feeds(&self, error: HeraldError) {
        let mut state = self.state.lock();
        for subscriber in state.subscribers.drain(..) {
            let _ = subscriber.tx.unbounded_send(Err(error.clone()));
        }
    }

    /// Fail the next `count` snapshot fetches
    pub fn fail_next_fetches(&self, count: usize, error: HeraldError) {
        let mut state = self.state.lock();
        state.faults.fetch.extend(std::iter::repeat(error).take(count));
    }

    /// Delay every snapshot fetch
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state.lock().faults.fetch_delay = delay;
    }

    /// Fail the next `count` read-state writes
    pub fn fail_next_writes(&self, count: usize, error: HeraldError) {
        let mut state = self.state.lock();
        state.faults.write.extend(std::iter::repeat(error).take(count));
    }

    /// Fail every read-state write until cleared
    pub fn fail_all_writes(&self, error: Option<HeraldError>) {
        self.state.lock().faults.write_always = error;
    }

    /// Fail the next `count` subscribe calls
    pub fn fail_next_subscribes(&self, count: usize, error: HeraldError) {
        let mut state = self.state.lock();
        state.faults.subscribe.extend(std::iter::repeat(error).take(count));
    }

    /// Make every accepted subscription end right away, as a flapping channel does
    pub fn close_feeds_on_open(&self, enabled: bool) {
        self.state.lock().faults.close_on_open = enabled;
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Number of change feeds whose consumer is still attached
    pub fn active_subscriptions(&self) -> usize {
        let mut state = self.state.lock();
        state.prune();
        state.subscribers.len()
    }

    /// Active change feeds for one owner
    pub fn active_subscriptions_for(&self, owner: IdentityId) -> usize {
        let mut state = self.state.lock();
        state.prune();
        state
            .subscribers
            .iter()
            .filter(|s| s.filter.owner == owner)
            .count()
    }

    /// Successful read-state writes, in order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    /// Read-state write calls, including failed ones
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    /// Snapshot fetch calls, including failed ones
    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    /// Subscribe calls, including failed ones
    pub fn subscribe_count(&self) -> usize {
        self.state.lock().subscribes
    }

    /// Stored read flag of a row
    pub fn is_read(&self, namespace: Namespace, id: NotificationId) -> Option<bool> {
        self.state
            .lock()
            .rows
            .get(&namespace)
            .and_then(|rows| rows.iter().find(|n| n.id == id))
            .map(|n| n.is_read)
    }

    /// Stored rows of a namespace
    pub fn rows(&self, namespace: Namespace) -> Vec<Notification> {
        self.state
            .lock()
            .rows
            .get(&namespace)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationBackend for InMemoryBackend {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Notification>, HeraldError> {
        let (fault, delay) = {
            let mut state = self.state.lock();
            state.fetches += 1;
            (state.faults.fetch.pop_front(), state.faults.fetch_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = fault {
            return Err(error);
        }

        let state = self.state.lock();
        let mut rows: Vec<Notification> = state
            .rows
            .get(&query.namespace)
            .map(|rows| {
                rows.iter()
                    .filter(|n| n.owner == query.owner)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| match query.order {
            SortOrder::Descending => b.created_at.cmp(&a.created_at),
            SortOrder::Ascending => a.created_at.cmp(&b.created_at),
        });
        rows.truncate(query.limit);
        Ok(rows)
    }

    async fn set_read(&self, namespace: Namespace, id: NotificationId) -> Result<(), HeraldError> {
        let mut state = self.state.lock();
        if let Some(error) = state.next_write_fault() {
            return Err(error);
        }
        if let Some(row) = state
            .rows
            .get_mut(&namespace)
            .and_then(|rows| rows.iter_mut().find(|n| n.id == id))
        {
            row.is_read = true;
        }
        state.writes.push(WriteRecord::Single { namespace, id });
        Ok(())
    }

    async fn set_all_read(
        &self,
        namespace: Namespace,
        owner: IdentityId,
        ids: &[NotificationId],
    ) -> Result<(), HeraldError> {
        let mut state = self.state.lock();
        if let Some(error) = state.next_write_fault() {
            return Err(error);
        }
        if let Some(rows) = state.rows.get_mut(&namespace) {
            for row in rows
                .iter_mut()
                .filter(|n| n.owner == owner && ids.contains(&n.id))
            {
                row.is_read = true;
            }
        }
        state.writes.push(WriteRecord::Bulk {
            namespace,
            owner,
            ids: ids.to_vec(),
        });
        Ok(())
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream, HeraldError> {
        let mut state = self.state.lock();
        state.subscribes += 1;
        if let Some(error) = state.faults.subscribe.pop_front() {
            return Err(error);
        }
        if state.faults.close_on_open {
            return Ok(futures::stream::empty().boxed());
        }
        let (tx, rx) = mpsc::unbounded();
        state.prune();
        state.subscribers.push(Subscriber { filter, tx });
        Ok(rx.boxed())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryBackend")
            .field("namespaces", &state.rows.len())
            .field("subscribers", &state.subscribers.len())
            .field("writes", &state.writes.len())
            .finish()
    }
}
