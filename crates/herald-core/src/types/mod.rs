//! Notification domain types

mod change;
mod namespace;
mod notification;

pub use change::{ChangeEvent, ChangeKind};
pub use namespace::Namespace;
pub use notification::Notification;
