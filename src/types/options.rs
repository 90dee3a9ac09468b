//! Session options and configuration
//!
//! Holds everything the session manager reads when it launches a turn or
//! supervises one, plus a builder for easy configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::transport::subprocess::config::{DANGEROUS_ENV_VARS, DEFAULT_MAX_LINE_BYTES};

/// Upper bound accepted for `max_turns`
pub const MAX_ALLOWED_TURNS: u32 = 1000;

/// Default number of agent turns per launch
pub const DEFAULT_MAX_TURNS: u32 = 25;

/// Default interval between heartbeat summaries
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default inactivity timeout before the supervisor kills a silent process
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Context window of the model family the CLI talks to, in tokens
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Prompt sent when resuming a session that was interrupted mid-turn
pub const DEFAULT_CONTINUATION_PROMPT: &str =
    "The previous session was interrupted before it finished. Continue where you left off.";

// ============================================================================
// Session Options
// ============================================================================

/// Main options for the session manager
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Path to the Claude Code CLI (searched on `PATH` when unset)
    pub cli_path: Option<PathBuf>,
    /// Working directory for the CLI process (the project root)
    pub cwd: Option<PathBuf>,
    /// Maximum number of agent turns per launch
    pub max_turns: u32,
    /// Silence on the primary channel that triggers a kill; zero disables
    pub inactivity_timeout: Duration,
    /// Interval between heartbeat summaries
    pub heartbeat_interval: Duration,
    /// Launch a continuation turn after an interrupted session is recovered
    pub auto_resume: bool,
    /// Context window used for the remaining-context estimate
    pub context_window: u64,
    /// Longest accepted line on either output channel
    pub max_line_bytes: usize,
    /// Prompt used for the automatic continuation turn
    pub continuation_prompt: String,
    /// Extra environment variables for the CLI process
    pub extra_env: HashMap<String, String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cli_path: None,
            cwd: None,
            max_turns: DEFAULT_MAX_TURNS,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            auto_resume: true,
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            continuation_prompt: DEFAULT_CONTINUATION_PROMPT.to_string(),
            extra_env: HashMap::new(),
        }
    }
}

impl SessionOptions {
    /// Create a new builder for `SessionOptions`
    #[must_use]
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }

    /// Check bounds on configurable values
    ///
    /// # Errors
    /// Returns `SessionError::InvalidConfig` when a value is out of range or
    /// an extra environment variable is on the denylist
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 || self.max_turns > MAX_ALLOWED_TURNS {
            return Err(SessionError::invalid_config(format!(
                "max_turns must be between 1 and {MAX_ALLOWED_TURNS}, got {}",
                self.max_turns
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(SessionError::invalid_config(
                "heartbeat_interval must be positive",
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(SessionError::invalid_config("max_line_bytes must be positive"));
        }
        if let Some(key) = self
            .extra_env
            .keys()
            .find(|key| DANGEROUS_ENV_VARS.contains(&key.as_str()))
        {
            return Err(SessionError::invalid_config(format!(
                "environment variable {key} may not be overridden"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Builder for SessionOptions
// ============================================================================

/// Builder for `SessionOptions`
#[derive(Debug, Default)]
pub struct SessionOptionsBuilder {
    options: SessionOptions,
}

impl SessionOptionsBuilder {
    /// Set the CLI path
    #[must_use]
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Set max turns
    #[must_use]
    pub const fn max_turns(mut self, turns: u32) -> Self {
        self.options.max_turns = turns;
        self
    }

    /// Set the inactivity timeout (`Duration::ZERO` disables it)
    #[must_use]
    pub const fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.options.inactivity_timeout = timeout;
        self
    }

    /// Set the heartbeat interval
    #[must_use]
    pub const fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.options.heartbeat_interval = interval;
        self
    }

    /// Enable or disable automatic resumption after an interruption
    #[must_use]
    pub const fn auto_resume(mut self, enabled: bool) -> Self {
        self.options.auto_resume = enabled;
        self
    }

    /// Set the context window size in tokens
    #[must_use]
    pub const fn context_window(mut self, tokens: u64) -> Self {
        self.options.context_window = tokens;
        self
    }

    /// Set the maximum accepted line length
    #[must_use]
    pub const fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.options.max_line_bytes = bytes;
        self
    }

    /// Set the continuation prompt
    #[must_use]
    pub fn continuation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.continuation_prompt = prompt.into();
        self
    }

    /// Add an environment variable for the CLI process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.extra_env.insert(key.into(), value.into());
        self
    }

    /// Build the options
    ///
    /// # Errors
    /// Returns `SessionError::InvalidConfig` if validation fails
    pub fn build(self) -> Result<SessionOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
