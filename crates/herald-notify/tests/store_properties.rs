//! Property tests for the notification store invariants.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use herald_core::NotificationId;
use herald_notify::NotificationStore;
use herald_testkit::{arb_notification, arb_store_ops, identity, StoreOp};
use proptest::prelude::*;
use std::collections::HashSet;

fn apply(store: &mut NotificationStore, op: &StoreOp) {
    match op {
        StoreOp::Initialize(rows) => {
            store.initialize(rows.clone());
        }
        StoreOp::Merge(n) => {
            store.merge(n.clone());
        }
        StoreOp::MarkRead(id) => {
            store.set_read(*id);
        }
        StoreOp::MarkAllRead => {
            store.set_all_read();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_after_every_operation(ops in arb_store_ops(identity("p"), 12, 40)) {
        let mut store = NotificationStore::new();
        for op in &ops {
            apply(&mut store, op);
            prop_assert!(store.is_consistent());
            prop_assert_eq!(store.unread_count(), store.recount_unread());
        }
    }

    #[test]
    fn read_is_sticky(ops in arb_store_ops(identity("p"), 8, 40)) {
        let mut store = NotificationStore::new();
        let mut read: HashSet<NotificationId> = HashSet::new();
        for op in &ops {
            apply(&mut store, op);
            for n in store.notifications().iter().filter(|n| n.is_read) {
                read.insert(n.id);
            }
            for id in &read {
                if let Some(n) = store.get(*id) {
                    prop_assert!(n.is_read, "notification {} became unread again", id);
                }
            }
        }
    }

    #[test]
    fn read_operations_never_raise_unread(ops in arb_store_ops(identity("p"), 10, 40)) {
        let mut store = NotificationStore::new();
        for op in &ops {
            let before = store.unread_count();
            let len_before = store.len();
            apply(&mut store, op);
            match op {
                StoreOp::MarkRead(_) | StoreOp::MarkAllRead => {
                    prop_assert!(store.unread_count() <= before);
                    prop_assert_eq!(store.len(), len_before);
                }
                StoreOp::Initialize(_) | StoreOp::Merge(_) => {
                    prop_assert!(store.len() >= len_before);
                }
            }
        }
    }

    #[test]
    fn merge_order_does_not_matter(
        rows in prop::collection::vec(arb_notification(identity("p"), 16), 0..24)
            .prop_shuffle()
    ) {
        let mut forward = NotificationStore::new();
        let mut backward = NotificationStore::new();
        let unique: Vec<_> = {
            let mut seen = HashSet::new();
            rows.iter().filter(|n| seen.insert(n.id)).cloned().collect()
        };

        for n in &unique {
            forward.merge(n.clone());
        }
        for n in unique.iter().rev() {
            backward.merge(n.clone());
        }

        let ids = |s: &NotificationStore| s.notifications().iter().map(|n| n.id).collect::<Vec<_>>();
        prop_assert_eq!(ids(&forward), ids(&backward));
        prop_assert_eq!(forward.unread_count(), backward.unread_count());
        prop_assert_eq!(forward.len(), unique.len());
    }
}
