//! Herald Testing Infrastructure
//!
//! Shared test support for the Herald crates: an in-memory backend with fault
//! injection, deterministic fixtures, proptest strategies and helpers for
//! waiting on published views.
//!
//! ```toml
//! [dev-dependencies]
//! herald-testkit = { path = "../herald-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

pub mod backend;
pub mod fixtures;
pub mod strategies;
pub mod wait;

pub use backend::{InMemoryBackend, WriteRecord};
pub use fixtures::*;
pub use strategies::*;
pub use wait::*;
