//! Liveness supervision, run once per consumer poll
//!
//! The supervisor never touches the process itself. It looks at a
//! [`Probe`] taken by the session manager and returns a [`Verdict`].

use std::time::{Duration, Instant};

use crate::dispatch::Liveness;

/// What the session manager observed at the start of a poll
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    /// Channel timestamps and counters
    pub liveness: Liveness,
    /// A process handle is held
    pub has_process: bool,
    /// The held process has exited
    pub process_exited: bool,
    /// Primary reader task still running
    pub primary_alive: bool,
    /// Diagnostic reader task still running
    pub diagnostic_alive: bool,
    /// The session phase is a running one, as of after the drain
    pub session_running: bool,
}

/// Action the session manager must take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing to do
    Healthy,
    /// The primary channel was silent for too long; kill the process
    TimedOut {
        /// Silence observed
        elapsed: Duration,
    },
    /// The session thinks it is running but nothing is left behind it
    Orphaned,
    /// The turn is over but the process stayed silent for the timeout;
    /// release it without reporting a failure
    Lingering,
}

/// Heartbeat, inactivity timeout and orphan detection
#[derive(Debug)]
pub struct LivenessSupervisor {
    heartbeat_interval: Duration,
    inactivity_timeout: Duration,
    last_heartbeat: Instant,
    heartbeats: u64,
}

impl LivenessSupervisor {
    /// Create a supervisor; a zero `inactivity_timeout` disables the timeout
    #[must_use]
    pub fn new(heartbeat_interval: Duration, inactivity_timeout: Duration, now: Instant) -> Self {
        Self {
            heartbeat_interval,
            inactivity_timeout,
            last_heartbeat: now,
            heartbeats: 0,
        }
    }

    /// Heartbeat summaries logged so far
    #[must_use]
    pub const fn heartbeat_count(&self) -> u64 {
        self.heartbeats
    }

    /// Restart the heartbeat clock for a new turn
    pub fn reset(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    /// Evaluate one poll cycle
    pub fn check(&mut self, probe: &Probe, now: Instant) -> Verdict {
        if !probe.has_process && !probe.session_running {
            return Verdict::Healthy;
        }

        self.heartbeat(probe, now);

        let readers_done = !probe.primary_alive && !probe.diagnostic_alive;
        if probe.session_running && (!probe.has_process || (probe.process_exited && readers_done)) {
            return Verdict::Orphaned;
        }

        if !self.inactivity_timeout.is_zero() && probe.has_process {
            let elapsed = probe.liveness.primary_silence(now);
            if elapsed >= self.inactivity_timeout {
                return if probe.session_running {
                    Verdict::TimedOut { elapsed }
                } else {
                    Verdict::Lingering
                };
            }
        }

        Verdict::Healthy
    }

    fn heartbeat(&mut self, probe: &Probe, now: Instant) {
        if now.saturating_duration_since(self.last_heartbeat) < self.heartbeat_interval {
            return;
        }
        self.last_heartbeat = now;
        self.heartbeats += 1;

        let liveness = &probe.liveness;
        log::info!(
            "Heartbeat: last event {:.1}s ago (stdout {:.1}s), process {}, readers stdout={} stderr={}, pending {}, lines {}",
            liveness.any_silence(now).as_secs_f64(),
            liveness.primary_silence(now).as_secs_f64(),
            if probe.has_process && !probe.process_exited { "alive" } else { "gone" },
            probe.primary_alive,
            probe.diagnostic_alive,
            liveness.pending,
            liveness.lines_seen(),
        );
    }
}
