//! Session state machine
//!
//! Pure state: no I/O and no clock. The session manager feeds it stream
//! events in arrival order and forwards whatever [`SessionEvent`]s come back
//! to the rendering layer.

use crate::types::events::{LogEntry, LogKind, Phase, SessionEvent, StreamEvent};
use crate::types::identifiers::{SessionId, ToolName};

/// One logical conversation with the agent
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: SessionId,
    phase: Phase,
    active_tool: Option<ToolName>,
    completed: bool,
    /// Assistant text not yet terminated by a newline
    pending_text: String,
}

impl Session {
    /// Create an idle session with no id
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session id assigned by the agent, empty until the first `init`
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Tool presumed in flight; only set while the phase is `ToolActive`
    #[must_use]
    pub fn active_tool(&self) -> Option<&ToolName> {
        self.active_tool.as_ref()
    }

    /// Whether the current turn ended with a completion event
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Restore an id recovered from a previous instance
    pub fn restore_id(&mut self, id: SessionId) {
        self.id = id;
    }

    /// Reset per-turn state and move to `Starting`
    pub fn begin_turn(&mut self, out: &mut Vec<SessionEvent>) {
        self.completed = false;
        self.active_tool = None;
        self.pending_text.clear();
        self.set_phase(Phase::Starting, out);
    }

    /// Apply one parsed event
    pub fn apply(&mut self, event: StreamEvent, context_window: u64, out: &mut Vec<SessionEvent>) {
        if !matches!(event, StreamEvent::AssistantText { .. }) {
            self.flush_text(out);
        }

        match event {
            StreamEvent::Init { session_id } => self.set_id(session_id, out),
            StreamEvent::Thinking => {
                if matches!(self.phase, Phase::Starting | Phase::ToolActive) {
                    self.active_tool = None;
                    self.set_phase(Phase::Thinking, out);
                }
            }
            StreamEvent::AssistantText { chunk } => {
                self.push_text(&chunk, out);
                if self.phase.is_running() {
                    self.active_tool = None;
                    self.set_phase(Phase::Thinking, out);
                }
            }
            StreamEvent::ToolUse { name } => {
                if self.phase.is_running() {
                    out.push(log_entry(LogKind::Status, format!("Using tool: {name}")));
                    self.active_tool = Some(name);
                    self.set_phase(Phase::ToolActive, out);
                }
            }
            StreamEvent::ToolResult { is_error, content } => {
                if is_error {
                    let text = if content.is_empty() {
                        "Tool reported an error".to_string()
                    } else {
                        format!("Tool error: {content}")
                    };
                    out.push(log_entry(LogKind::Error, text));
                }
            }
            StreamEvent::Completion(completion) => {
                if let Some(id) = completion.session_id.clone() {
                    self.set_id(id, out);
                }
                self.completed = true;
                self.active_tool = None;
                if self.phase.is_running() {
                    self.set_phase(Phase::Completed, out);
                }
                let kind = if completion.is_error { LogKind::Error } else { LogKind::Status };
                out.push(log_entry(kind, completion.summary(context_window)));
                out.push(SessionEvent::Completed);
            }
            StreamEvent::Error { message } => {
                out.push(log_entry(LogKind::Error, format!("Agent error: {message}")));
            }
            StreamEvent::Unknown { message_type } => {
                log::debug!("Ignoring unknown message type: {message_type}");
            }
        }
    }

    /// The primary channel closed; the process has exited or is about to
    pub fn close_stream(&mut self, out: &mut Vec<SessionEvent>) {
        self.flush_text(out);
        if self.phase.is_running() {
            self.active_tool = None;
            out.push(log_entry(LogKind::Status, "Process exited without a result"));
            self.set_phase(Phase::Idle, out);
        }
    }

    /// Explicit cancellation: leave any running phase for `Idle`
    pub fn cancel(&mut self, out: &mut Vec<SessionEvent>) {
        self.flush_text(out);
        self.active_tool = None;
        if self.phase.is_running() {
            self.set_phase(Phase::Idle, out);
        }
    }

    /// The host is going away
    ///
    /// Returns `true` if the turn was cut short, in which case the caller
    /// must persist the session id.
    pub fn interrupt(&mut self, out: &mut Vec<SessionEvent>) -> bool {
        if !self.phase.is_running() || self.completed {
            return false;
        }
        self.flush_text(out);
        self.active_tool = None;
        self.set_phase(Phase::Interrupted, out);
        true
    }

    fn set_id(&mut self, id: SessionId, out: &mut Vec<SessionEvent>) {
        if id.is_empty() || id == self.id {
            return;
        }
        log::info!("Session id: {id}");
        self.id = id.clone();
        out.push(SessionEvent::SessionIdChanged(id));
    }

    fn set_phase(&mut self, phase: Phase, out: &mut Vec<SessionEvent>) {
        if self.phase != phase {
            log::debug!("Phase {} -> {phase}", self.phase);
            self.phase = phase;
            out.push(SessionEvent::PhaseChanged(phase));
        }
    }

    /// Append a chunk; everything up to the last newline is logged at once
    ///
    /// Separate chunks are separate blocks, so a held partial line is ended
    /// before the next chunk is appended.
    fn push_text(&mut self, chunk: &str, out: &mut Vec<SessionEvent>) {
        if !self.pending_text.is_empty() {
            self.pending_text.push('\n');
        }
        self.pending_text.push_str(chunk);
        if let Some(split) = self.pending_text.rfind('\n') {
            let rest = self.pending_text.split_off(split + 1);
            let complete = std::mem::replace(&mut self.pending_text, rest);
            let complete = complete.trim_end_matches('\n');
            if !complete.is_empty() {
                out.push(log_entry(LogKind::Assistant, complete));
            }
        }
    }

    fn flush_text(&mut self, out: &mut Vec<SessionEvent>) {
        if !self.pending_text.is_empty() {
            let text = std::mem::take(&mut self.pending_text);
            out.push(log_entry(LogKind::Assistant, text));
        }
    }
}

fn log_entry(kind: LogKind, text: impl Into<String>) -> SessionEvent {
    SessionEvent::Log(LogEntry::new(kind, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(events: &[SessionEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(SessionEvent::as_log)
            .map(|entry| entry.text.clone())
            .collect()
    }

    #[test]
    fn test_partial_text_is_held_until_next_event() {
        let mut session = Session::new();
        let mut out = Vec::new();
        session.begin_turn(&mut out);
        out.clear();

        session.apply(StreamEvent::AssistantText { chunk: "line one\nline two".into() }, 0, &mut out);
        assert_eq!(texts(&out), ["line one"]);

        session.apply(StreamEvent::AssistantText { chunk: "next block".into() }, 0, &mut out);
        assert_eq!(texts(&out), ["line one", "line two"]);

        session.apply(StreamEvent::Thinking, 0, &mut out);
        assert_eq!(texts(&out), ["line one", "line two", "next block"]);
    }

    #[test]
    fn test_tool_use_ignored_when_not_running() {
        let mut session = Session::new();
        let mut out = Vec::new();
        session.apply(StreamEvent::ToolUse { name: ToolName::new("Bash") }, 0, &mut out);
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.active_tool().is_none());
        assert!(out.is_empty());
    }
}
