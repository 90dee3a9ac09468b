//! Event type definitions
//!
//! Two families of events live here: [`StreamEvent`], parsed from one line of
//! the CLI's primary channel and consumed immediately by the session state
//! machine, and [`SessionEvent`], handed to whatever renders the session.

use chrono::{DateTime, Utc};

use super::identifiers::{SessionId, ToolName};

// ============================================================================
// Stream Events
// ============================================================================

/// Metrics carried by a `result` message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Session id reported with the result
    pub session_id: Option<SessionId>,
    /// Total cost in USD
    pub cost_usd: Option<f64>,
    /// Number of agent turns used
    pub turns: Option<u32>,
    /// Input token counter
    pub tokens_in: Option<u64>,
    /// Output token counter
    pub tokens_out: Option<u64>,
    /// Whether the agent reported the turn as failed
    pub is_error: bool,
}

impl Completion {
    /// Estimate of the context window left after this turn
    ///
    /// `None` unless both token counters were reported. Saturates at zero
    /// when usage exceeds the window.
    #[must_use]
    pub fn remaining_context(&self, context_window: u64) -> Option<u64> {
        let used = self.tokens_in?.saturating_add(self.tokens_out?);
        Some(context_window.saturating_sub(used))
    }

    /// One-line human summary used for the status log entry
    #[must_use]
    pub fn summary(&self, context_window: u64) -> String {
        let mut parts = Vec::new();
        if let Some(turns) = self.turns {
            parts.push(format!("turns: {turns}"));
        }
        if let Some(cost) = self.cost_usd {
            parts.push(format!("cost: ${cost:.4}"));
        }
        if let (Some(tokens_in), Some(tokens_out)) = (self.tokens_in, self.tokens_out) {
            parts.push(format!("tokens: {tokens_in} in / {tokens_out} out"));
        }
        if let Some(remaining) = self.remaining_context(context_window) {
            parts.push(format!("context remaining: ~{remaining}"));
        }

        let outcome = if self.is_error { "Finished with error" } else { "Completed" };
        if parts.is_empty() {
            outcome.to_string()
        } else {
            format!("{outcome} ({})", parts.join(", "))
        }
    }
}

/// Logical event reconstructed from one line of the primary channel
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `system`/`init`: the agent assigned a session id
    Init {
        /// Session id for continuation on later turns
        session_id: SessionId,
    },
    /// Activity marker: the model is composing a response
    Thinking,
    /// Incremental assistant text
    AssistantText {
        /// Text of one `text` content block
        chunk: String,
    },
    /// The agent invoked a tool
    ToolUse {
        /// Name of the first `tool_use` block on the line
        name: ToolName,
    },
    /// A tool returned
    ToolResult {
        /// Whether the tool reported failure
        is_error: bool,
        /// String content of the result, empty when structured
        content: String,
    },
    /// `result`: the turn finished
    Completion(Completion),
    /// Protocol-level error reported by the agent
    Error {
        /// Error message
        message: String,
    },
    /// Message type this crate does not handle
    Unknown {
        /// Raw value of the `type` field
        message_type: String,
    },
}

// ============================================================================
// Session Phase
// ============================================================================

/// Activity phase of the current conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No turn in flight
    #[default]
    Idle,
    /// Process launched, nothing heard yet
    Starting,
    /// The model is producing a response
    Thinking,
    /// A tool invocation is presumed in flight
    ToolActive,
    /// The last turn finished with a completion event
    Completed,
    /// The host went away mid-turn
    Interrupted,
}

impl Phase {
    /// Whether a turn is in flight
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Thinking | Self::ToolActive)
    }

    /// Whether a new turn may be launched from this phase
    #[must_use]
    pub const fn can_launch(self) -> bool {
        !self.is_running()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Thinking => "thinking",
            Self::ToolActive => "tool active",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Consumer-facing Events
// ============================================================================

/// Kind tag for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Text written by the assistant
    Assistant,
    /// Echo of the prompt sent by the user
    User,
    /// Failures of any kind
    Error,
    /// Lifecycle and progress notes
    Status,
}

/// A single log line for display
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Kind tag
    pub kind: LogKind,
    /// Text of the entry
    pub text: String,
    /// When the consumer produced the entry
    pub at: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Event delivered to the rendering layer by `SessionManager::poll`
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Append an entry to the log
    Log(LogEntry),
    /// The session phase changed
    PhaseChanged(Phase),
    /// The agent assigned or changed the session id
    SessionIdChanged(SessionId),
    /// The turn finished with a completion event
    Completed,
}

impl SessionEvent {
    /// Log entry if this event is one
    #[must_use]
    pub fn as_log(&self) -> Option<&LogEntry> {
        match self {
            Self::Log(entry) => Some(entry),
            _ => None,
        }
    }
}
