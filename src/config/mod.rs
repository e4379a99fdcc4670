//! Configuration management for wavetap.
//!
//! Loads the TOML settings file from the user's config directory.

pub mod file;

pub use file::{config_path, WavetapConfig};
