//! Application command handlers for wavetap.
//!
//! # Commands
//! - `watch`: Live stream viewer (default)
//! - `replay`: Play a raw sample capture through the viewer
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod logs;
pub mod replay;
pub mod watch;

pub use config::handle_config;
pub use logs::handle_logs;
pub use replay::handle_replay;
pub use watch::handle_watch;
