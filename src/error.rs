//! Error types for the session manager

use std::time::Duration;

use thiserror::Error;

/// Main error type for the session manager
#[derive(Error, Debug)]
pub enum SessionError {
    /// Claude Code CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// The executable could not be started
    #[error("Launch failed: {0}")]
    Launch(String),

    /// Reading one of the subprocess output channels failed
    #[error("Read failed on {channel}: {message}")]
    Read {
        /// Channel name (`stdout` or `stderr`)
        channel: &'static str,
        /// Error message
        message: String,
    },

    /// A line did not match the expected event schema
    #[error("Parse error: {0}")]
    Parse(#[from] crate::message::ParseError),

    /// A turn is already in flight
    #[error("A turn is already running (phase: {0})")]
    Busy(String),

    /// The supervisor killed a silent subprocess
    #[error("No output for {:.1}s, subprocess killed", .elapsed.as_secs_f64())]
    Timeout {
        /// Silence duration that triggered the kill
        elapsed: Duration,
    },

    /// The process vanished without an exit notification
    #[error("Subprocess was unexpectedly lost: {0}")]
    OrphanLoss(String),

    /// Recovery store read or write failure
    #[error("Recovery store error: {0}")]
    Recovery(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (recovery store)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for session manager operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or set the CLI path explicitly in the session options"
                .to_string(),
        )
    }

    /// Create a launch error
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Create a read error for a named channel
    pub fn read(channel: &'static str, msg: impl Into<String>) -> Self {
        Self::Read {
            channel,
            message: msg.into(),
        }
    }

    /// Create a busy error
    pub fn busy(phase: impl Into<String>) -> Self {
        Self::Busy(phase.into())
    }

    /// Create a recovery store error
    pub fn recovery(msg: impl Into<String>) -> Self {
        Self::Recovery(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
