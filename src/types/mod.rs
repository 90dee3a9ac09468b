//! Type definitions for the session manager
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `ToolName`)
//! - [`events`] - Stream events, phases, and consumer-facing events
//! - [`options`] - Session configuration and its builder

pub mod events;
pub mod identifiers;
pub mod options;

pub use events::{Completion, LogEntry, LogKind, Phase, SessionEvent, StreamEvent};
pub use identifiers::{SessionId, ToolName};
pub use options::{SessionOptions, SessionOptionsBuilder};
