//! Terminal screens.

pub mod error;
pub mod watch;

pub use watch::{WatchCommand, WatchTui};
