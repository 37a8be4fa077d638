//! Dynamic<T> - A reactive value with change notifications
//!
//! `Dynamic<T>` wraps a value and offers two ways to observe it:
//!
//! - poll-based [`Subscription`]s that track a version counter, for render loops
//!   that pull state on their own schedule;
//! - push-based observers registered with [`Dynamic::observe`], invoked on every
//!   `set()`, for presentation layers that want a callback per transition.
//!
//! Only `parking_lot` locks and atomics are used, so the type works with any
//! async runtime or none.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Inner state of a Dynamic value.
struct DynamicInner<T> {
    /// The current value
    value: RwLock<T>,
    /// Version counter incremented on each update
    version: AtomicU64,
    /// Registered observers, keyed by registration id
    observers: Mutex<Vec<(u64, Observer<T>)>>,
    /// Next observer registration id
    next_observer: AtomicU64,
}

/// A reactive value that can be observed for changes.
///
/// Clones share state. Observers run synchronously on the thread that calls
/// `set()`, after the new value is visible to `get()`; they must not block.
#[derive(Clone)]
pub struct Dynamic<T> {
    inner: Arc<DynamicInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Dynamic<T> {
    /// Create a new Dynamic with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(DynamicInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Read the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Get the current version number.
    ///
    /// The version is incremented each time `set()` is called.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Set a new value, bump the version and notify observers.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.write();
            *guard = value;
        }
        self.inner.version.fetch_add(1, Ordering::Release);
        self.notify();
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let new_value = f(self.get());
        self.set(new_value);
    }

    /// Subscribe to value changes by polling.
    ///
    /// The subscription starts at the current version, so the first `poll()`
    /// returns `None` until the next `set()`.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            source: self.inner.clone(),
            last_version: self.inner.version.load(Ordering::Acquire),
        }
    }

    /// Register a callback invoked with the new value on every `set()`.
    ///
    /// The callback is detached when the returned handle is dropped or
    /// [`ObserverHandle::unsubscribe`] is called.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, Arc::new(callback)));

        let weak: Weak<DynamicInner<T>> = Arc::downgrade(&self.inner);
        ObserverHandle {
            detach: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.observers.lock().retain(|(oid, _)| *oid != id);
                }
            })),
        }
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    fn notify(&self) {
        // Snapshot the observer list so callbacks may (un)register observers.
        let observers: Vec<Observer<T>> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        if observers.is_empty() {
            return;
        }

        let value = self.get();
        for observer in observers {
            observer(&value);
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Dynamic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynamic")
            .field("value", &self.get())
            .field("version", &self.version())
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Handle returned by [`Dynamic::observe`]; detaches the observer on drop.
#[must_use = "dropping the handle unsubscribes the observer immediately"]
pub struct ObserverHandle {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ObserverHandle {
    /// Detach the observer now.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Keep the observer registered for as long as the source lives.
    pub fn forget(mut self) {
        self.detach = None;
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// A subscription to a Dynamic value for polling changes.
///
/// Version-based, not queue-based: several updates between two polls are
/// coalesced into the latest value.
pub struct Subscription<T> {
    source: Arc<DynamicInner<T>>,
    last_version: u64,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Check if the source has changed since the last poll.
    pub fn has_changed(&self) -> bool {
        self.source.version.load(Ordering::Acquire) > self.last_version
    }

    /// Poll for a new value.
    ///
    /// Returns `Some(value)` if the source has been updated since the last poll.
    pub fn poll(&mut self) -> Option<T> {
        let current_version = self.source.version.load(Ordering::Acquire);
        if current_version > self.last_version {
            self.last_version = current_version;
            Some(self.source.value.read().clone())
        } else {
            None
        }
    }

    /// Get the current value regardless of whether it changed.
    pub fn get(&self) -> T {
        self.source.value.read().clone()
    }

    /// Get the last version this subscription observed.
    pub fn last_observed_version(&self) -> u64 {
        self.last_version
    }
}
