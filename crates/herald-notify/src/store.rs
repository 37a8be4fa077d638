//! Notification store
//!
//! The in-memory, ordered, deduplicated collection for one identity and one
//! namespace. The store is a plain single-writer value; sharing and session
//! fencing are handled by [`crate::state::NotificationState`].
//!
//! Invariants held after every operation:
//! - no two stored notifications share an id;
//! - notifications are sorted newest first ([`Notification::canonical_cmp`]);
//! - `unread_count()` equals the number of stored notifications with
//!   `is_read == false`;
//! - a notification observed read, locally or from the backend, stays read for
//!   the lifetime of the store.

use herald_core::{Notification, NotificationId};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Result of merging a single live notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New id, inserted at its ordered position
    Inserted,
    /// Known id, store unchanged
    Duplicate,
    /// Known id that arrived read; the stored copy was upgraded to read
    DuplicateMarkedRead,
}

impl MergeOutcome {
    /// Whether the store changed
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// Effect of marking one notification read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMark {
    /// Stored and unread; flipped to read
    Flipped,
    /// Not stored yet; remembered and applied when the row arrives
    Remembered,
    /// Already read, or already remembered
    AlreadyRead,
}

impl ReadMark {
    /// Whether this call produced read state the backend has not been told about
    #[must_use]
    pub fn needs_persist(&self) -> bool {
        !matches!(self, Self::AlreadyRead)
    }
}

/// Summary of a snapshot initialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitializeSummary {
    /// Snapshot rows whose ids were not yet stored
    pub inserted: usize,
    /// Stored notifications upgraded to read by the snapshot
    pub marked_read: usize,
    /// Snapshot rows ignored because their id was already stored
    pub duplicates: usize,
}

impl InitializeSummary {
    /// Whether the store changed
    #[must_use]
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.marked_read > 0
    }
}

/// Ordered, deduplicated notification collection with an unread counter.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
    ids: HashSet<NotificationId>,
    read_marks: HashSet<NotificationId>,
    unread: usize,
}

impl NotificationStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot into the store.
    ///
    /// On an empty store this is a plain replace. When live events already
    /// landed, the snapshot is unioned by id: rows already stored are kept as
    /// they are, except that a row the snapshot reports read upgrades the stored
    /// copy. A row whose id was marked read locally stays read regardless of
    /// what the snapshot says.
    pub fn initialize<I>(&mut self, snapshot: I) -> InitializeSummary
    where
        I: IntoIterator<Item = Notification>,
    {
        let mut summary = InitializeSummary::default();

        for mut notification in snapshot {
            if self.ids.contains(&notification.id) {
                if notification.is_read && self.mark_present_read(notification.id) {
                    summary.marked_read += 1;
                } else {
                    summary.duplicates += 1;
                }
                continue;
            }
            self.absorb_read_mark(&mut notification);
            self.ids.insert(notification.id);
            if notification.is_unread() {
                self.unread += 1;
            }
            self.items.push(notification);
            summary.inserted += 1;
        }

        if summary.inserted > 0 {
            self.items.sort_by(Notification::canonical_cmp);
        }
        debug_assert!(self.is_consistent());
        summary
    }

    /// Merge one live notification.
    ///
    /// Unknown ids are inserted at their ordered position (a newest event lands
    /// in front). Known ids are ignored, except that a copy arriving read marks
    /// the stored one read.
    pub fn merge(&mut self, mut notification: Notification) -> MergeOutcome {
        if self.ids.contains(&notification.id) {
            return if notification.is_read && self.mark_present_read(notification.id) {
                MergeOutcome::DuplicateMarkedRead
            } else {
                MergeOutcome::Duplicate
            };
        }

        self.absorb_read_mark(&mut notification);
        let position = self
            .items
            .partition_point(|existing| existing.canonical_cmp(&notification) == Ordering::Less);
        self.ids.insert(notification.id);
        if notification.is_unread() {
            self.unread += 1;
        }
        self.items.insert(position, notification);

        debug_assert!(self.is_consistent());
        MergeOutcome::Inserted
    }

    /// Mark one notification read.
    ///
    /// An id that is not stored yet (snapshot still loading, row older than the
    /// page) is remembered, so the row shows up read when it arrives. Only the
    /// first call for an id reports anything but [`ReadMark::AlreadyRead`].
    pub fn set_read(&mut self, id: NotificationId) -> ReadMark {
        let mark = if self.ids.contains(&id) {
            if self.mark_present_read(id) {
                ReadMark::Flipped
            } else {
                ReadMark::AlreadyRead
            }
        } else if self.read_marks.insert(id) {
            ReadMark::Remembered
        } else {
            ReadMark::AlreadyRead
        };
        debug_assert!(self.is_consistent());
        mark
    }

    /// Mark every stored notification read.
    ///
    /// Returns the ids that were unread before the call, in store order.
    pub fn set_all_read(&mut self) -> Vec<NotificationId> {
        let mut flipped = Vec::with_capacity(self.unread);
        for notification in self.items.iter_mut().filter(|n| n.is_unread()) {
            notification.is_read = true;
            self.read_marks.insert(notification.id);
            flipped.push(notification.id);
        }
        self.unread = 0;
        flipped
    }

    /// Number of unread notifications
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Unread count derived from the stored items
    pub fn recount_unread(&self) -> usize {
        self.items.iter().filter(|n| n.is_unread()).count()
    }

    /// Notifications, newest first
    pub fn notifications(&self) -> &[Notification] {
        &self.items
    }

    /// Look up a notification by id
    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.items.iter().find(|n| n.id == id)
    }

    /// Whether an id is stored
    pub fn contains(&self, id: NotificationId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of stored notifications
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop everything, including remembered read marks.
    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
        self.read_marks.clear();
        self.unread = 0;
    }

    /// Check all structural invariants
    pub fn is_consistent(&self) -> bool {
        let unique = self.ids.len() == self.items.len()
            && self.items.iter().all(|n| self.ids.contains(&n.id));
        let ordered = self
            .items
            .windows(2)
            .all(|pair| pair[0].canonical_cmp(&pair[1]) != Ordering::Greater);
        let sticky = self
            .items
            .iter()
            .filter(|n| self.read_marks.contains(&n.id))
            .all(|n| n.is_read);
        unique && ordered && sticky && self.unread == self.recount_unread()
    }

    fn mark_present_read(&mut self, id: NotificationId) -> bool {
        if !self.ids.contains(&id) {
            return false;
        }
        let Some(notification) = self.items.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        self.read_marks.insert(id);
        if notification.is_read {
            return false;
        }
        notification.is_read = true;
        self.unread = self.unread.saturating_sub(1);
        true
    }

    fn absorb_read_mark(&mut self, notification: &mut Notification) {
        if self.read_marks.contains(&notification.id) {
            notification.is_read = true;
        } else if notification.is_read {
            self.read_marks.insert(notification.id);
        }
    }
}
