//! First-run setup and config migration.
//!
//! Writes the embedded default config the first time wavetap runs and
//! refreshes its version line after upgrades.

pub mod version;

use anyhow::anyhow;
use std::path::Path;

use version::SetupState;

/// Embedded default configuration template.
pub(crate) const DEFAULT_CONFIG: &str = include_str!("../../environments/wavetap.toml");

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Brings the config file at `config_path` up to date.
///
/// A missing file is created from the template. An older or unversioned file
/// keeps its settings and only gets a new version line.
///
/// # Errors
/// - If the config file cannot be read or written
pub fn ensure_config(config_path: &Path) -> anyhow::Result<()> {
    match version::check_setup_needed(config_path)? {
        SetupState::Missing => {
            tracing::info!("No config found, writing defaults to {}", config_path.display());
            write_default_config(config_path)
                .map_err(|e| anyhow!("Setup failed: {e}"))?;
        }
        SetupState::Outdated(old_version) => {
            tracing::info!(
                "Migrating config from version {} to {}",
                old_version,
                CURRENT_VERSION
            );
            version::update_config_version(config_path)
                .map_err(|e| anyhow!("Failed to update config version: {e}"))?;
        }
        SetupState::Current => {
            tracing::debug!("Config version up to date ({})", CURRENT_VERSION);
        }
    }
    Ok(())
}

/// Writes the template prefixed with the current version.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
fn write_default_config(config_path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let full_config = format!(
        "{}\n{}",
        version::version_line(CURRENT_VERSION),
        DEFAULT_CONFIG
    );
    std::fs::write(config_path, full_config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_writes_versioned_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wavetap.toml");

        ensure_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&version::version_line(CURRENT_VERSION)));
        assert!(content.contains("[stream]"));
        assert!(matches!(
            version::check_setup_needed(&path).unwrap(),
            SetupState::Current
        ));
    }

    #[test]
    fn test_upgrade_keeps_user_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wavetap.toml");
        std::fs::write(&path, "config_version = \"0.0.1\"\n[display]\namplitude = 3.0\n").unwrap();

        ensure_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("amplitude = 3.0"));
        assert_eq!(content.matches("config_version").count(), 1);
    }
}
