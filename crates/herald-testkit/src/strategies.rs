//! Proptest strategies for notification streams

use herald_core::{IdentityId, Notification, NotificationId};
use proptest::prelude::*;

/// Operation applied to a store in property tests
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// Load a snapshot
    Initialize(Vec<Notification>),
    /// Merge one live notification
    Merge(Notification),
    /// Mark one id read
    MarkRead(NotificationId),
    /// Mark everything read
    MarkAllRead,
}

/// Notification drawn from a small id space so duplicates are common
pub fn arb_notification(owner: IdentityId, id_space: u8) -> impl Strategy<Value = Notification> {
    (0..id_space, 0u64..1_000, any::<bool>()).prop_map(move |(slot, created_at, is_read)| {
        let mut n = Notification::new(
            NotificationId::from_seed(&[slot]),
            owner,
            "system",
            format!("slot {slot}"),
            created_at,
        );
        n.is_read = is_read;
        n
    })
}

/// Sequence of store operations over a shared id space
pub fn arb_store_ops(
    owner: IdentityId,
    id_space: u8,
    max_len: usize,
) -> impl Strategy<Value = Vec<StoreOp>> {
    let op = prop_oneof![
        1 => prop::collection::vec(arb_notification(owner, id_space), 0..8)
            .prop_map(StoreOp::Initialize),
        4 => arb_notification(owner, id_space).prop_map(StoreOp::Merge),
        3 => (0..id_space).prop_map(|slot| StoreOp::MarkRead(NotificationId::from_seed(&[slot]))),
        1 => Just(StoreOp::MarkAllRead),
    ];
    prop::collection::vec(op, 0..max_len)
}
