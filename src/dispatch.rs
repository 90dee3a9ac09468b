//! Hand-off queue between the reader tasks and the consumer
//!
//! Both reader tasks push [`DispatchAction`]s; only the consumer drains them,
//! on its own polling schedule. The queue and the liveness timestamps share
//! one lock, and nothing else is shared between readers and consumer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::message::ParseError;
use crate::types::events::{LogKind, StreamEvent};

/// Which output channel a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// stdout, carrying the NDJSON event stream
    Primary,
    /// stderr, free text
    Diagnostic,
}

impl Channel {
    /// Short channel name for messages
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Primary => "stdout",
            Self::Diagnostic => "stderr",
        }
    }
}

/// Deferred unit of work applied by the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAction {
    /// Feed a parsed event to the session state machine
    Event(StreamEvent),
    /// Append a log entry
    Log {
        /// Kind tag
        kind: LogKind,
        /// Entry text
        text: String,
    },
    /// A primary-channel line could not be parsed
    ParseFailed(ParseError),
    /// A channel read failed and its reader stopped
    ReadFailed {
        /// Channel that failed
        channel: Channel,
        /// Error message
        message: String,
    },
    /// The primary channel reached end of stream
    StreamClosed,
}

/// An action tagged with the turn that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    /// Turn number assigned at launch
    pub turn: u64,
    /// The action
    pub action: DispatchAction,
}

/// Point-in-time view of queue depth and channel activity
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    /// Last line on the primary channel (or turn launch)
    pub last_primary: Instant,
    /// Last line on either channel (or turn launch)
    pub last_any: Instant,
    /// Lines read from the primary channel this turn
    pub lines_primary: u64,
    /// Lines read from the diagnostic channel this turn
    pub lines_diagnostic: u64,
    /// Actions waiting for the consumer
    pub pending: usize,
}

impl Liveness {
    /// Silence on the primary channel as of `now`
    #[must_use]
    pub fn primary_silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_primary)
    }

    /// Silence on both channels as of `now`
    #[must_use]
    pub fn any_silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_any)
    }

    /// Total lines seen on both channels
    #[must_use]
    pub const fn lines_seen(&self) -> u64 {
        self.lines_primary + self.lines_diagnostic
    }
}

struct QueueState {
    pending: VecDeque<Pending>,
    last_primary: Instant,
    last_any: Instant,
    lines_primary: u64,
    lines_diagnostic: u64,
}

/// Thread-safe FIFO of pending actions plus channel liveness
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct DispatchQueue {
    state: Arc<Mutex<QueueState>>,
}

impl DispatchQueue {
    /// Create an empty queue with both timestamps at `now`
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                last_primary: now,
                last_any: now,
                lines_primary: 0,
                lines_diagnostic: 0,
            })),
        }
    }

    /// Append an action
    pub fn push(&self, turn: u64, action: DispatchAction) {
        self.state.lock().pending.push_back(Pending { turn, action });
    }

    /// Record a line received on `channel`
    pub fn touch(&self, channel: Channel, now: Instant) {
        let mut state = self.state.lock();
        state.last_any = now;
        match channel {
            Channel::Primary => {
                state.last_primary = now;
                state.lines_primary += 1;
            }
            Channel::Diagnostic => state.lines_diagnostic += 1,
        }
    }

    /// Take every pending action, oldest first
    #[must_use]
    pub fn drain(&self) -> Vec<Pending> {
        self.state.lock().pending.drain(..).collect()
    }

    /// Number of pending actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether no actions are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restart liveness tracking for a new turn
    ///
    /// Pending actions are kept; stale ones are filtered by turn number.
    pub fn reset_liveness(&self, now: Instant) {
        let mut state = self.state.lock();
        state.last_primary = now;
        state.last_any = now;
        state.lines_primary = 0;
        state.lines_diagnostic = 0;
    }

    /// Snapshot of timestamps, counters and depth
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        let state = self.state.lock();
        Liveness {
            last_primary: state.last_primary,
            last_any: state.last_any,
            lines_primary: state.lines_primary,
            lines_diagnostic: state.lines_diagnostic,
            pending: state.pending.len(),
        }
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(text: &str) -> DispatchAction {
        DispatchAction::Log {
            kind: LogKind::Status,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_diagnostic_lines_do_not_refresh_primary() {
        let start = Instant::now();
        let queue = DispatchQueue::new(start);
        let later = start + Duration::from_secs(5);
        queue.touch(Channel::Diagnostic, later);

        let liveness = queue.liveness();
        assert_eq!(liveness.last_primary, start);
        assert_eq!(liveness.last_any, later);
        assert_eq!(liveness.lines_seen(), 1);
    }

    #[test]
    fn test_reset_keeps_pending_actions() {
        let queue = DispatchQueue::new(Instant::now());
        queue.push(1, log("a"));
        queue.touch(Channel::Primary, Instant::now());
        queue.reset_liveness(Instant::now());

        assert_eq!(queue.liveness().lines_primary, 0);
        assert_eq!(queue.len(), 1);
    }
}
