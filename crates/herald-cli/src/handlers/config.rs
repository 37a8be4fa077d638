//! Config check command handler

use anyhow::{Context, Result};
use herald_core::config::HeraldConfig;
use herald_notify::EngineConfig;
use std::path::Path;

/// Load, merge with the environment, validate and print a config file
pub fn handle_check_config(path: &Path) -> Result<()> {
    let config = resolve(path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;

    println!("# {} is valid", path.display());
    println!("{rendered}");
    Ok(())
}

fn resolve(path: &Path) -> Result<EngineConfig> {
    EngineConfig::load(Some(path))
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Namespace;
    use std::io::Write;

    #[test]
    fn test_resolve_accepts_valid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "namespace = \"forum\"\npage_size = 50").unwrap();

        let config = resolve(file.path()).unwrap();
        assert_eq!(config.namespace, Namespace::Forum);
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn test_resolve_reports_path_on_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "page_size = 0").unwrap();

        let err = resolve(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("page_size"));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
