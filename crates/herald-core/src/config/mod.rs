//! Configuration
//!
//! A small layered configuration system: typed defaults, TOML/JSON files,
//! `HERALD_*` environment overrides and accumulated validation.

mod traits;
mod validation;

pub use traits::{parse_value, HeraldConfig};
pub use validation::{ConfigValidator, ValidationError};
