//! Configuration file management for wavetap.
//!
//! Settings live in `~/.config/wavetap/wavetap.toml`. Every key has a default,
//! so a partial file (or an empty one) is valid.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::stream::history::HISTORY_SIZE;
use crate::stream::SessionConfig;

/// Largest allowed `max_speed / min_speed`.
pub const MAX_SPEED_RATIO: f64 = 100.0;

/// Where the live stream and its companion API are.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket endpoint delivering sample chunks
    pub url: String,
    /// Base URL of the acknowledgment and report endpoints
    pub api_base: String,
    /// Timeout for one acknowledgment or report call
    pub ack_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/audio".to_string(),
            api_base: "http://127.0.0.1:8000".to_string(),
            ack_timeout_ms: 5000,
        }
    }
}

impl StreamConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Waveform scale and scroll speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub amplitude: f64,
    pub speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            speed: 1.0,
            min_speed: 1.0,
            max_speed: 5.0,
        }
    }
}

/// Pacing for `wavetap replay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Samples per chunk
    pub chunk_len: usize,
    pub chunks_per_second: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            chunk_len: 1024,
            chunks_per_second: 25.0,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WavetapConfig {
    pub stream: StreamConfig,
    pub display: DisplayConfig,
    pub replay: ReplayConfig,
}

impl WavetapConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed or a value is out of range
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    /// - If the file cannot be read
    /// - If the TOML is malformed or a value is out of range
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: WavetapConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// - If any value is outside its allowed range
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = &self.stream.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(anyhow!("stream.url must start with ws:// or wss://, got '{url}'"));
        }
        if !self.stream.api_base.starts_with("http") {
            return Err(anyhow!(
                "stream.api_base must be an http(s) URL, got '{}'",
                self.stream.api_base
            ));
        }
        if self.stream.ack_timeout_ms == 0 {
            return Err(anyhow!("stream.ack_timeout_ms must be greater than 0"));
        }

        let display = &self.display;
        if display.amplitude.is_nan() || display.amplitude < 0.0 {
            return Err(anyhow!("display.amplitude must be >= 0"));
        }
        if display.min_speed.is_nan() || display.min_speed <= 0.0 {
            return Err(anyhow!("display.min_speed must be greater than 0"));
        }
        if !display.max_speed.is_finite() {
            return Err(anyhow!("display.max_speed must be a finite number"));
        }
        if display.max_speed < display.min_speed {
            return Err(anyhow!(
                "display.max_speed ({}) is below display.min_speed ({})",
                display.max_speed,
                display.min_speed
            ));
        }
        if display.max_speed / display.min_speed > MAX_SPEED_RATIO {
            return Err(anyhow!(
                "display.max_speed may be at most {MAX_SPEED_RATIO} times display.min_speed"
            ));
        }
        if display.speed.is_nan() {
            return Err(anyhow!("display.speed must be a number"));
        }

        if self.replay.chunk_len == 0 {
            return Err(anyhow!("replay.chunk_len must be greater than 0"));
        }
        if self.replay.chunks_per_second.is_nan() || self.replay.chunks_per_second <= 0.0 {
            return Err(anyhow!("replay.chunks_per_second must be greater than 0"));
        }
        Ok(())
    }

    /// Session settings for a surface of `width` x `height` pixels.
    pub fn session_config(&self, width: f64, height: f64) -> SessionConfig {
        SessionConfig {
            width,
            height,
            amplitude: self.display.amplitude,
            speed: self.display.speed,
            min_speed: self.display.min_speed,
            max_speed: self.display.max_speed,
            history_size: HISTORY_SIZE,
        }
    }
}

/// Directory holding the config file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("wavetap"))
}

/// Path of the config file; it may not exist yet.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("wavetap.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = write_config(
            r#"config_version = "0.1.0"

[display]
amplitude = 2.5
"#,
        );
        let config = WavetapConfig::load_from(file.path()).unwrap();
        assert_eq!(config.display.amplitude, 2.5);
        assert_eq!(config.display.max_speed, 5.0);
        assert_eq!(config.stream.url, "ws://127.0.0.1:8000/audio");
        assert_eq!(config.replay.chunks_per_second, 25.0);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let file = write_config("[display]\nmin_speed = 3.0\nmax_speed = 2.0\n");
        let err = WavetapConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_speed"));

        let file = write_config("[stream]\nurl = \"http://localhost\"\n");
        assert!(WavetapConfig::load_from(file.path()).is_err());

        let file = write_config("[display]\namplitude = -1.0\n");
        assert!(WavetapConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_rejects_extreme_speed_range() {
        let file = write_config("[display]\nspeed = 1e20\nmax_speed = 1e20\n");
        let err = WavetapConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("at most"));

        let file = write_config("[display]\nmax_speed = inf\n");
        assert!(WavetapConfig::load_from(file.path()).is_err());

        let file = write_config("[display]\nspeed = nan\n");
        assert!(WavetapConfig::load_from(file.path()).is_err());

        let file = write_config("[display]\nmin_speed = 0.5\nmax_speed = 50.0\n");
        assert!(WavetapConfig::load_from(file.path()).is_ok());
    }

    #[test]
    fn test_malformed_toml_names_the_file() {
        let file = write_config("[display\n");
        let err = WavetapConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_embedded_template_is_valid() {
        let config: WavetapConfig = toml::from_str(crate::setup::DEFAULT_CONFIG).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_session_config_carries_display_settings() {
        let config = WavetapConfig::default();
        let session = config.session_config(320.0, 96.0);
        assert_eq!(session.width, 320.0);
        assert_eq!(session.history_size, HISTORY_SIZE);
        assert_eq!(session.max_speed, 5.0);
    }
}
