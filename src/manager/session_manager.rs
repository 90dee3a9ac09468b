//! Session manager: the single consumer
//!
//! Owns the session state, the subprocess handle and the supervisor. All
//! mutation happens inside its methods, which the host calls from one
//! context on its own cadence. Reader tasks only ever touch the
//! [`DispatchQueue`].

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;

use super::session::Session;
use super::supervisor::{LivenessSupervisor, Probe, Verdict};
use crate::dispatch::{DispatchAction, DispatchQueue};
use crate::error::{Result, SessionError};
use crate::recovery::RecoveryStore;
use crate::transport::ProcessHandle;
use crate::types::events::{LogEntry, LogKind, Phase, SessionEvent};
use crate::types::identifiers::{SessionId, ToolName};
use crate::types::options::SessionOptions;

/// Read-only instrumentation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Lines read from stdout this turn
    pub lines_primary: u64,
    /// Lines read from stderr this turn
    pub lines_diagnostic: u64,
    /// Actions waiting for the next poll
    pub pending_actions: usize,
    /// stdout reader task running
    pub primary_reader_alive: bool,
    /// stderr reader task running
    pub diagnostic_reader_alive: bool,
    /// Subprocess held and not yet exited
    pub process_running: bool,
}

/// Manager for one streaming CLI session
pub struct SessionManager {
    options: SessionOptions,
    store: Arc<dyn RecoveryStore>,
    runtime: Handle,
    session: Session,
    process: Option<ProcessHandle>,
    queue: DispatchQueue,
    supervisor: LivenessSupervisor,
    /// Bumped on every launch and every forced release; older actions are stale
    generation: u64,
    outbox: Vec<SessionEvent>,
}

impl SessionManager {
    /// Create a manager on the current tokio runtime
    ///
    /// # Errors
    /// Returns error if the options are invalid or no runtime is running
    pub fn new(options: SessionOptions, store: Arc<dyn RecoveryStore>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            SessionError::invalid_config(format!("SessionManager needs a tokio runtime: {e}"))
        })?;
        Self::with_runtime(options, store, runtime)
    }

    /// Create a manager whose reader tasks run on `runtime`
    ///
    /// # Errors
    /// Returns error if the options are invalid
    pub fn with_runtime(
        options: SessionOptions,
        store: Arc<dyn RecoveryStore>,
        runtime: Handle,
    ) -> Result<Self> {
        options.validate()?;
        let now = Instant::now();
        let supervisor =
            LivenessSupervisor::new(options.heartbeat_interval, options.inactivity_timeout, now);
        Ok(Self {
            options,
            store,
            runtime,
            session: Session::new(),
            process: None,
            queue: DispatchQueue::new(now),
            supervisor,
            generation: 0,
            outbox: Vec::new(),
        })
    }

    /// Fresh-instance hook: take back an interruption left by a previous host
    ///
    /// Returns `true` if a continuation turn was launched.
    ///
    /// # Errors
    /// Returns error if the recovery store fails or the resumed turn cannot start
    pub fn initialize(&mut self) -> Result<bool> {
        let record = self.store.take_interruption()?;
        if !record.interrupted {
            return Ok(false);
        }

        log::info!("Recovered interrupted session '{}'", record.session_id);
        if record.session_id.is_empty() {
            self.note(LogKind::Status, "Previous turn was interrupted before a session id arrived");
            return Ok(false);
        }

        self.note(
            LogKind::Status,
            format!("Previous turn of session {} was interrupted", record.session_id),
        );
        self.session.restore_id(record.session_id.clone());
        self.outbox.push(SessionEvent::SessionIdChanged(record.session_id));

        if !self.options.auto_resume {
            return Ok(false);
        }
        let prompt = self.options.continuation_prompt.clone();
        self.send(&prompt)?;
        Ok(true)
    }

    /// Start a turn
    ///
    /// # Errors
    /// Returns `Busy` while a turn is in flight, or a launch error if the CLI
    /// cannot be started; in the latter case the phase is back at `Idle`.
    pub fn launch(&mut self, prompt: &str, resume: Option<&SessionId>) -> Result<()> {
        self.reap();
        if self.process.is_some() || !self.session.phase().can_launch() {
            return Err(SessionError::busy(self.session.phase().to_string()));
        }

        self.note(LogKind::User, prompt);
        self.generation += 1;
        let now = Instant::now();
        self.session.begin_turn(&mut self.outbox);
        self.queue.reset_liveness(now);
        self.supervisor.reset(now);

        match ProcessHandle::spawn(
            &self.runtime,
            &self.options,
            prompt,
            resume,
            &self.queue,
            self.generation,
        ) {
            Ok(handle) => {
                self.process = Some(handle);
                Ok(())
            }
            Err(err) => {
                log::error!("{err}");
                self.note(LogKind::Error, err.to_string());
                self.session.cancel(&mut self.outbox);
                Err(err)
            }
        }
    }

    /// Start a turn continuing the current session, if it has an id
    ///
    /// # Errors
    /// Same as [`launch`](Self::launch)
    pub fn send(&mut self, prompt: &str) -> Result<()> {
        let id = self.session.id().clone();
        let resume = if id.is_empty() { None } else { Some(&id) };
        self.launch(prompt, resume)
    }

    /// Terminate the subprocess, if any, and leave any running phase
    ///
    /// Idempotent and never fails.
    pub fn kill(&mut self) {
        self.release_process();
        self.session.cancel(&mut self.outbox);
    }

    /// Host teardown hook
    ///
    /// Runs synchronously: if a turn is cut short its session id is
    /// persisted, then the subprocess is killed. The kill happens even if the
    /// store write fails.
    ///
    /// # Errors
    /// Returns error if the interruption could not be persisted
    pub fn on_teardown(&mut self) -> Result<()> {
        let persisted = if self.session.interrupt(&mut self.outbox) {
            log::info!("Turn interrupted, persisting session '{}'", self.session.id());
            self.store.persist_interruption(self.session.id())
        } else {
            Ok(())
        };
        self.release_process();
        persisted
    }

    /// Drain pending actions and run the supervisor
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        self.poll_at(Instant::now())
    }

    /// [`poll`](Self::poll) against an explicit clock reading
    pub fn poll_at(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut out = std::mem::take(&mut self.outbox);

        // Reader state is sampled before draining so that a finished reader's
        // final actions are always in this drain.
        let (has_process, process_exited, primary_alive, diagnostic_alive) =
            match self.process.as_mut() {
                Some(process) => (
                    true,
                    process.has_exited(),
                    process.primary_alive(),
                    process.diagnostic_alive(),
                ),
                None => (false, false, false, false),
            };
        let liveness = self.queue.liveness();

        for pending in self.queue.drain() {
            if pending.turn != self.generation {
                log::debug!("Dropping stale action from turn {}", pending.turn);
                continue;
            }
            if let Err(err) = self.apply(pending.action, &mut out) {
                log::error!("{err}");
                out.push(log_event(LogKind::Error, err.to_string()));
            }
        }

        let probe = Probe {
            liveness,
            has_process,
            process_exited,
            primary_alive,
            diagnostic_alive,
            session_running: self.session.phase().is_running(),
        };
        match self.supervisor.check(&probe, now) {
            Verdict::Healthy => {
                if process_exited && !primary_alive && !diagnostic_alive {
                    log::debug!("Reaped subprocess of turn {}", self.generation);
                    self.process = None;
                }
            }
            Verdict::Orphaned => {
                let err = SessionError::OrphanLoss(
                    "process exited without closing its output".to_string(),
                );
                log::warn!("{err}");
                self.release_process();
                self.session.cancel(&mut out);
                out.push(log_event(LogKind::Error, err.to_string()));
            }
            Verdict::Lingering => {
                log::info!(
                    "Turn {} finished but its process is still silent, releasing it",
                    self.generation
                );
                self.release_process();
            }
            Verdict::TimedOut { elapsed } => {
                let err = SessionError::Timeout { elapsed };
                log::warn!("{err}");
                self.release_process();
                self.session.cancel(&mut out);
                out.push(log_event(LogKind::Error, err.to_string()));
            }
        }

        out
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// Session id, empty until the agent assigns one
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }

    /// Tool presumed in flight
    #[must_use]
    pub fn active_tool(&self) -> Option<&ToolName> {
        self.session.active_tool()
    }

    /// Whether the last turn finished with a completion event
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.session.is_completed()
    }

    /// Whether a subprocess handle is still held
    #[must_use]
    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    /// Effective options
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Instrumentation snapshot
    pub fn stats(&mut self) -> SessionStats {
        let liveness = self.queue.liveness();
        let (primary_reader_alive, diagnostic_reader_alive, process_running) =
            match self.process.as_mut() {
                Some(process) => (
                    process.primary_alive(),
                    process.diagnostic_alive(),
                    !process.has_exited(),
                ),
                None => (false, false, false),
            };
        SessionStats {
            lines_primary: liveness.lines_primary,
            lines_diagnostic: liveness.lines_diagnostic,
            pending_actions: liveness.pending,
            primary_reader_alive,
            diagnostic_reader_alive,
            process_running,
        }
    }

    fn apply(&mut self, action: DispatchAction, out: &mut Vec<SessionEvent>) -> Result<()> {
        match action {
            DispatchAction::Event(event) => {
                self.session.apply(event, self.options.context_window, out);
            }
            DispatchAction::Log { kind, text } => out.push(log_event(kind, text)),
            DispatchAction::ParseFailed(err) => return Err(err.into()),
            DispatchAction::ReadFailed { channel, message } => {
                return Err(SessionError::read(channel.name(), message));
            }
            DispatchAction::StreamClosed => self.session.close_stream(out),
        }
        Ok(())
    }

    /// Drop a handle whose process and readers are all finished
    fn reap(&mut self) {
        let finished = match self.process.as_mut() {
            Some(process) => process.has_exited() && process.readers_done(),
            None => false,
        };
        if finished {
            self.process = None;
        }
    }

    /// Kill and forget the subprocess; its remaining actions become stale
    fn release_process(&mut self) {
        if let Some(process) = self.process.take() {
            log::info!("Killing subprocess of turn {} (pid {:?})", self.generation, process.pid());
            process.kill();
            self.generation += 1;
        }
    }

    fn note(&mut self, kind: LogKind, text: impl Into<String>) {
        self.outbox.push(log_event(kind, text));
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.release_process();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session)
            .field("process", &self.process)
            .field("queue", &self.queue)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

fn log_event(kind: LogKind, text: impl Into<String>) -> SessionEvent {
    SessionEvent::Log(LogEntry::new(kind, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Channel;
    use crate::recovery::MemoryRecoveryStore;

    #[tokio::test]
    async fn test_stdout_read_failure_is_reported_and_turn_ends() {
        let mut manager =
            SessionManager::new(SessionOptions::default(), Arc::new(MemoryRecoveryStore::new())).unwrap();
        manager.generation = 1;
        manager.session.begin_turn(&mut manager.outbox);

        manager.queue.push(
            1,
            DispatchAction::ReadFailed {
                channel: Channel::Primary,
                message: "pipe gone".to_string(),
            },
        );
        manager.queue.push(1, DispatchAction::StreamClosed);
        manager.queue.push(0, DispatchAction::StreamClosed);

        let events = manager.poll();
        let errors: Vec<_> = events
            .iter()
            .filter_map(SessionEvent::as_log)
            .filter(|entry| entry.kind == LogKind::Error)
            .map(|entry| entry.text.as_str())
            .collect();
        assert_eq!(errors, ["Read failed on stdout: pipe gone"]);
        assert_eq!(events.last(), Some(&SessionEvent::PhaseChanged(Phase::Idle)));
        assert_eq!(manager.phase(), Phase::Idle);
        assert!(manager.queue.is_empty());
    }
}
