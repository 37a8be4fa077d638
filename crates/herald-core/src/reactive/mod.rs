//! # Reactive Primitives
//!
//! Reactive values used to expose engine state to presentation layers without
//! coupling to any UI framework.
//!
//! ## Core Types
//!
//! - [`Dynamic<T>`]: a value that can be read, replaced and observed.
//! - [`Subscription<T>`]: poll-based change detection via version counters.
//! - [`ObserverHandle`]: unsubscribe handle for push-based callbacks.
//!
//! ## Usage
//!
//! ```rust
//! use herald_core::reactive::Dynamic;
//!
//! let unread = Dynamic::new(0usize);
//! let handle = unread.observe(|count| println!("unread: {count}"));
//!
//! unread.set(3);
//! assert_eq!(unread.get(), 3);
//!
//! handle.unsubscribe();
//! ```

mod dynamic;

pub use dynamic::{Dynamic, ObserverHandle, Subscription};
