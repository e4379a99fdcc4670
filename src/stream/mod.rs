//! Live chunk stream: decoding, history, scrolling, rendering and the
//! acknowledgment protocol.
//!
//! A transport task decodes inbound frames and feeds them to a `Session`,
//! which owns all mutable state and publishes a `FrameView` for the terminal
//! UI after every change.

pub mod accounting;
pub mod clock;
pub mod collaborator;
pub mod decode;
pub mod echo;
pub mod history;
pub mod render;
pub mod session;
pub mod transport;

pub use collaborator::{Collaborator, HttpCollaborator, OfflineCollaborator};
pub use render::{DrawOp, Rgb};
pub use session::{FrameView, Lifecycle, Session, SessionConfig, SessionEvent, SessionSummary};
pub use transport::{pump, FrameSource, ReplaySource, WebSocketSource};
