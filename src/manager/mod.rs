//! Session management
//!
//! - [`session`] - phase state machine for one conversation
//! - [`supervisor`] - heartbeat, inactivity timeout, orphan detection
//! - [`session_manager`] - the consumer tying process, queue and state together

pub mod session;
pub mod session_manager;
pub mod supervisor;

pub use session::Session;
pub use session_manager::{SessionManager, SessionStats};
pub use supervisor::{LivenessSupervisor, Probe, Verdict};
