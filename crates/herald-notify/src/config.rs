//! Engine configuration
//!
//! Loaded through [`HeraldConfig`]: defaults, then an optional TOML/JSON file,
//! then `HERALD_*` environment variables. Nested retry sections accept either
//! `section.field` or `section_field` keys, so `HERALD_RECONNECT_MAX_DELAY_MS`
//! maps to `reconnect.max_delay_ms`.

use herald_core::config::{parse_value, ConfigValidator, HeraldConfig};
use herald_core::reliability::{RetryPolicy, RetrySettings};
use herald_core::{HeraldError, Namespace};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted snapshot page
pub const MIN_PAGE_SIZE: usize = 1;
/// Largest accepted snapshot page
pub const MAX_PAGE_SIZE: usize = 100;
/// Default snapshot page
pub const DEFAULT_PAGE_SIZE: usize = 20;

const RETRY_SECTIONS: [&str; 3] = ["snapshot_retry", "persistence_retry", "reconnect"];

/// Notification engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace the engine serves
    pub namespace: Namespace,
    /// Snapshot size (most recent N)
    pub page_size: usize,
    /// Upper bound on one snapshot fetch
    pub snapshot_timeout_ms: u64,
    /// Reload the snapshot after every successful reconnect
    pub resnapshot_on_reconnect: bool,
    /// Retries for the initial snapshot
    pub snapshot_retry: RetrySettings,
    /// Retries for read-state writes
    pub persistence_retry: RetrySettings,
    /// Reconnect backoff for the live channel
    pub reconnect: RetrySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: Namespace::General,
            page_size: DEFAULT_PAGE_SIZE,
            snapshot_timeout_ms: 10_000,
            resnapshot_on_reconnect: true,
            snapshot_retry: RetrySettings {
                max_attempts: 2,
                initial_delay_ms: 500,
                max_delay_ms: 5_000,
                jitter: true,
            },
            persistence_retry: RetrySettings {
                max_attempts: 3,
                initial_delay_ms: 200,
                max_delay_ms: 2_000,
                jitter: false,
            },
            reconnect: RetrySettings {
                max_attempts: u32::MAX,
                initial_delay_ms: 500,
                max_delay_ms: 30_000,
                jitter: true,
            },
        }
    }
}

impl EngineConfig {
    /// Defaults for a namespace
    pub fn for_namespace(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Self::default()
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Set the snapshot page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the snapshot timeout
    #[must_use]
    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set read-state persistence retries
    #[must_use]
    pub fn with_persistence_retry(mut self, settings: RetrySettings) -> Self {
        self.persistence_retry = settings;
        self
    }

    /// Set snapshot retries
    #[must_use]
    pub fn with_snapshot_retry(mut self, settings: RetrySettings) -> Self {
        self.snapshot_retry = settings;
        self
    }

    /// Set reconnect backoff
    #[must_use]
    pub fn with_reconnect(mut self, settings: RetrySettings) -> Self {
        self.reconnect = settings;
        self
    }

    /// Enable or disable the snapshot reload after reconnect
    #[must_use]
    pub fn with_resnapshot_on_reconnect(mut self, enabled: bool) -> Self {
        self.resnapshot_on_reconnect = enabled;
        self
    }

    /// Page size clamped into the accepted range
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Snapshot timeout as a duration
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    /// Snapshot retry policy
    pub fn snapshot_policy(&self) -> RetryPolicy {
        self.snapshot_retry.to_policy()
    }

    /// Read-state persistence retry policy
    pub fn persistence_policy(&self) -> RetryPolicy {
        self.persistence_retry.to_policy()
    }

    /// Reconnect backoff policy
    pub fn reconnect_policy(&self) -> RetryPolicy {
        self.reconnect.to_policy()
    }

    fn set_retry_field(
        settings: &mut RetrySettings,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), HeraldError> {
        match field {
            "max_attempts" => settings.max_attempts = parse_value(key, value)?,
            "initial_delay_ms" => settings.initial_delay_ms = parse_value(key, value)?,
            "max_delay_ms" => settings.max_delay_ms = parse_value(key, value)?,
            "jitter" => settings.jitter = parse_value(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> HeraldError {
    HeraldError::invalid(format!("Unknown configuration key: {key}"))
}

fn validate_retry(validator: &ConfigValidator, section: &str, settings: &RetrySettings) -> ConfigValidator {
    let mut nested = validator.for_field(section);
    nested.check(
        "max_delay_ms",
        settings.max_delay_ms >= settings.initial_delay_ms,
        "must not be below initial_delay_ms",
    );
    nested
}

impl HeraldConfig for EngineConfig {
    fn validate(&self) -> Result<(), HeraldError> {
        let mut validator = ConfigValidator::new();
        validator.range(
            "page_size",
            u32::try_from(self.page_size).unwrap_or(u32::MAX),
            Some(MIN_PAGE_SIZE as u32),
            Some(MAX_PAGE_SIZE as u32),
        );
        validator.check(
            "snapshot_timeout_ms",
            self.snapshot_timeout_ms > 0,
            "must be positive",
        );

        let snapshot = validate_retry(&validator, "snapshot_retry", &self.snapshot_retry);
        let persistence = validate_retry(&validator, "persistence_retry", &self.persistence_retry);
        let mut reconnect = validate_retry(&validator, "reconnect", &self.reconnect);
        reconnect.check(
            "initial_delay_ms",
            self.reconnect.initial_delay_ms > 0,
            "must be positive so reconnects cannot spin",
        );

        validator.absorb(snapshot).absorb(persistence).absorb(reconnect);
        validator.finish()
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), HeraldError> {
        match key {
            "namespace" => self.namespace = parse_value(key, value)?,
            "page_size" => self.page_size = parse_value(key, value)?,
            "snapshot_timeout_ms" => self.snapshot_timeout_ms = parse_value(key, value)?,
            "resnapshot_on_reconnect" => self.resnapshot_on_reconnect = parse_value(key, value)?,
            _ => {
                let Some((section, field)) = RETRY_SECTIONS.iter().find_map(|section| {
                    key.strip_prefix(section)
                        .and_then(|rest| rest.strip_prefix('.').or_else(|| rest.strip_prefix('_')))
                        .map(|field| (*section, field))
                }) else {
                    return Err(unknown_key(key));
                };
                let settings = match section {
                    "snapshot_retry" => &mut self.snapshot_retry,
                    "persistence_retry" => &mut self.persistence_retry,
                    _ => &mut self.reconnect,
                };
                Self::set_retry_field(settings, key, field, value)?;
            }
        }
        Ok(())
    }
}
