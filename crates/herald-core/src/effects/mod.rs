//! Effect interfaces
//!
//! Traits only. The engine is written against these so it can run over a hosted
//! backend in production and the in-memory testkit backend in tests.

pub mod notification;

pub use notification::{
    ChangeFilter, ChangeStream, FetchQuery, NotificationBackend, SortOrder,
};
