//! # Claude Session
//!
//! Session manager for a streaming Claude Code CLI subprocess. Each turn
//! launches the CLI with `--output-format stream-json`, reads its stdout
//! event stream and its stderr diagnostics on two background tasks, and
//! hands everything to a single consumer through a polled queue.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use claude_session::{MemoryRecoveryStore, SessionManager, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryRecoveryStore::new());
//!     let mut manager = SessionManager::new(SessionOptions::default(), store)?;
//!
//!     manager.launch("What is 2 + 2?", None)?;
//!     while manager.phase().is_running() || manager.has_process() {
//!         for event in manager.poll() {
//!             if let Some(entry) = event.as_log() {
//!                 println!("{:?}: {}", entry.kind, entry.text);
//!             }
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Host teardown and recovery
//!
//! When the owning host is about to go away, call
//! [`SessionManager::on_teardown`]. If a turn was in flight its session id is
//! written to the [`RecoveryStore`]; the next instance calls
//! [`SessionManager::initialize`], which takes the record back and, when
//! auto-resume is enabled, continues the conversation with one prompt.
//!
//! ## Modules
//!
//! - [`message`] - minimal field extraction and line parsing
//! - [`transport`] - CLI discovery, command line, reader tasks
//! - [`dispatch`] - queue between reader tasks and the consumer
//! - [`manager`] - state machine, supervisor, session manager
//! - [`recovery`] - interruption record stores

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod error;
pub mod manager;
pub mod message;
pub mod recovery;
pub mod transport;
pub mod types;

pub use dispatch::{Channel, DispatchAction, DispatchQueue};
pub use error::{Result, SessionError};
pub use manager::{Session, SessionManager, SessionStats};
pub use message::{ParseError, parse_line};
pub use recovery::{FileRecoveryStore, Interruption, MemoryRecoveryStore, RecoveryStore};
pub use transport::find_cli;
pub use types::events::{Completion, LogEntry, LogKind, Phase, SessionEvent, StreamEvent};
pub use types::identifiers::{SessionId, ToolName};
pub use types::options::{SessionOptions, SessionOptionsBuilder};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
