//! Core configuration traits for the Herald configuration system

use crate::HeraldError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Core trait for Herald configuration types
///
/// Layering order used by [`HeraldConfig::load`]: defaults, then the file (if
/// any), then `HERALD_*` environment variables, then validation.
pub trait HeraldConfig:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Prefix for environment overrides
    const ENV_PREFIX: &'static str = "HERALD_";

    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML or JSON file
    fn load_from_file(path: &Path) -> Result<Self, HeraldError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HeraldError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| HeraldError::invalid(format!("Invalid TOML: {e}"))),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| HeraldError::invalid(format!("Invalid JSON: {e}"))),
            _ => Err(HeraldError::invalid(format!(
                "Unsupported config format: {}",
                path.display()
            ))),
        }
    }

    /// Merge with process environment variables
    fn merge_with_env(&mut self) -> Result<(), HeraldError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge with `(KEY, value)` pairs; keys without the prefix are ignored.
    ///
    /// `HERALD_PAGE_SIZE=15` becomes `set_from_string("page_size", "15")`.
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), HeraldError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(Self::ENV_PREFIX) {
                self.set_from_string(&config_key.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), HeraldError>;

    /// Set a configuration value from a string (env vars, CLI `key=value`)
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), HeraldError>;

    /// Defaults, then file, then environment, then validation.
    fn load(path: Option<&Path>) -> Result<Self, HeraldError> {
        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                Self::load_from_file(path)?
            }
            None => Self::defaults(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }
}

/// Parse a scalar config value, naming the key in the error
pub fn parse_value<T>(key: &str, value: &str) -> Result<T, HeraldError>
where
    T: std::str::FromStr,
{
    value
        .parse()
        .map_err(|_| HeraldError::invalid(format!("Invalid value for '{key}': {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValidator;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct ProbeConfig {
        name: String,
        limit: u32,
    }

    impl Default for ProbeConfig {
        fn default() -> Self {
            Self {
                name: "probe".to_string(),
                limit: 10,
            }
        }
    }

    impl HeraldConfig for ProbeConfig {
        fn validate(&self) -> Result<(), HeraldError> {
            let mut validator = ConfigValidator::new();
            validator.range("limit", self.limit, Some(1), Some(100));
            validator.finish()
        }

        fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), HeraldError> {
            match key {
                "name" => self.name = value.to_string(),
                "limit" => self.limit = parse_value(key, value)?,
                _ => {
                    return Err(HeraldError::invalid(format!(
                        "Unknown configuration key: {key}"
                    )))
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "limit = 42").unwrap();

        let config = ProbeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.limit, 42);
        assert_eq!(config.name, "probe");
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(ProbeConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_merge_with_vars_uses_prefix() {
        let mut config = ProbeConfig::default();
        config
            .merge_with_vars(vec![
                ("HERALD_LIMIT".to_string(), "7".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.limit, 7);
    }

    #[test]
    fn test_merge_with_vars_reports_bad_values() {
        let mut config = ProbeConfig::default();
        let err = config
            .merge_with_vars(vec![("HERALD_LIMIT".to_string(), "many".to_string())])
            .unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_validation_runs_on_file_values() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{\"limit\": 0}}").unwrap();
        let config = ProbeConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_err());
    }
}
