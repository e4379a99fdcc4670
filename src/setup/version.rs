//! Config version tracking.
//!
//! The first line of the config file records the wavetap version that wrote
//! it: `config_version = "X.Y.Z"`.

use anyhow::anyhow;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl SemanticVersion {
    fn parse(version_str: &str) -> anyhow::Result<Self> {
        let regex = Regex::new(r"^(\d+)\.(\d+)\.(\d+)$")?;
        let caps = regex.captures(version_str.trim()).ok_or_else(|| {
            anyhow!(
                "Invalid version format: '{}'. Expected 'major.minor.patch'",
                version_str
            )
        })?;
        let part = |i: usize| {
            caps[i]
                .parse::<u32>()
                .map_err(|_| anyhow!("Version component out of range: '{}'", &caps[i]))
        };
        Ok(SemanticVersion {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What setup has to do for a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupState {
    /// No config file yet
    Missing,
    /// Written by an older (or unknown) version
    Outdated(String),
    Current,
}

/// The version line written at the top of the config file.
pub fn version_line(version: &str) -> String {
    format!(r#"config_version = "{version}""#)
}

/// Reads the version from the first line of the config file.
///
/// The line must start with optional whitespace followed by
/// `config_version`; a commented-out line does not count.
///
/// # Errors
/// Returns an error if the file can't be read.
fn read_config_version_from_file(config_path: &Path) -> anyhow::Result<Option<String>> {
    let content = std::fs::read_to_string(config_path)?;
    let Some(first_line) = content.lines().next() else {
        return Ok(None);
    };

    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    Ok(regex
        .captures(first_line)
        .map(|caps| caps[1].to_string()))
}

/// Compares the config file's version with this binary's.
///
/// # Errors
/// Returns an error if the file exists but can't be read, or if a version
/// string is malformed.
pub fn check_setup_needed(config_path: &Path) -> anyhow::Result<SetupState> {
    if !config_path.exists() {
        return Ok(SetupState::Missing);
    }

    let Some(config_version) = read_config_version_from_file(config_path)? else {
        return Ok(SetupState::Outdated("unknown (unversioned config)".to_string()));
    };

    let config_parsed = SemanticVersion::parse(&config_version)?;
    let current_parsed = SemanticVersion::parse(CURRENT_VERSION)?;
    Ok(match config_parsed.cmp(&current_parsed) {
        Ordering::Less => SetupState::Outdated(config_parsed.to_string()),
        Ordering::Equal => SetupState::Current,
        Ordering::Greater => {
            tracing::warn!(
                "Config version {} is newer than app version {}",
                config_version,
                CURRENT_VERSION
            );
            SetupState::Current
        }
    })
}

/// Replaces (or adds) the version line at the top of the config file,
/// keeping every other line.
///
/// # Errors
/// Returns an error if the file can't be read or written.
pub fn update_config_version(config_path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(config_path)?;

    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().starts_with("config_version"))
        .collect();

    let mut new_content = version_line(CURRENT_VERSION);
    if !lines.is_empty() {
        new_content.push('\n');
        new_content.push_str(&lines.join("\n"));
    }
    new_content.push('\n');

    std::fs::write(config_path, new_content)?;
    Ok(())
}
