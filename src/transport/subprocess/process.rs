//! Child process handle for one turn
//!
//! Spawning wires stdout and stderr to their reader tasks on the supplied
//! runtime. The handle is owned by the session manager and dropped (which
//! kills the child) once the turn is reaped or cancelled.

use std::env;
use std::path::PathBuf;

use tokio::process::Child;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::dispatch::DispatchQueue;
use crate::error::{Result, SessionError};
use crate::types::identifiers::SessionId;
use crate::types::options::SessionOptions;

use super::command::CommandBuilder;
use super::config::CLI_BINARY_NAME;
use super::reader::{run_diagnostic_reader, run_primary_reader};

/// Find the Claude Code CLI binary
///
/// Looks on `PATH` first, then in the usual per-user install locations.
///
/// # Errors
/// Returns error if the CLI cannot be found anywhere
pub fn find_cli() -> Result<PathBuf> {
    if let Ok(path) = which::which(CLI_BINARY_NAME) {
        return Ok(path);
    }

    let home = env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/root"));
    let locations = [
        home.join(".npm-global/bin").join(CLI_BINARY_NAME),
        PathBuf::from("/usr/local/bin").join(CLI_BINARY_NAME),
        home.join(".local/bin").join(CLI_BINARY_NAME),
        home.join(".claude/local").join(CLI_BINARY_NAME),
        home.join("node_modules/.bin").join(CLI_BINARY_NAME),
        home.join(".yarn/bin").join(CLI_BINARY_NAME),
    ];

    locations
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(SessionError::cli_not_found)
}

/// Running CLI subprocess and its two reader tasks
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    primary: JoinHandle<()>,
    diagnostic: JoinHandle<()>,
}

impl ProcessHandle {
    /// Spawn one turn of the CLI
    ///
    /// Every action the readers produce is tagged with `turn`.
    ///
    /// # Errors
    /// Returns error if the CLI cannot be located or started
    pub fn spawn(
        runtime: &Handle,
        options: &SessionOptions,
        prompt: &str,
        resume: Option<&SessionId>,
        queue: &DispatchQueue,
        turn: u64,
    ) -> Result<Self> {
        let cli_path = match options.cli_path {
            Some(ref path) => path.clone(),
            None => find_cli()?,
        };

        let mut cmd = CommandBuilder::new(&cli_path, prompt, options)
            .resume(resume)
            .build();

        // Child reaping and pipe registration need the runtime context.
        let _guard = runtime.enter();

        let mut child = cmd.spawn().map_err(|e| {
            match options.cwd {
                Some(ref cwd) if !cwd.exists() => SessionError::launch(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                )),
                _ => SessionError::launch(format!(
                    "Failed to start {}: {e}",
                    cli_path.display()
                )),
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            let _ = child.start_kill();
            return Err(SessionError::launch("Failed to capture stdout/stderr handles"));
        };

        log::info!(
            "[turn {turn}] started {} (pid {:?})",
            cli_path.display(),
            child.id()
        );

        let max_line_bytes = options.max_line_bytes;
        let primary = runtime.spawn(run_primary_reader(stdout, queue.clone(), turn, max_line_bytes));
        let diagnostic =
            runtime.spawn(run_diagnostic_reader(stderr, queue.clone(), turn, max_line_bytes));

        Ok(Self {
            child,
            primary,
            diagnostic,
        })
    }

    /// OS process id, if the child has not been reaped yet
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the child has exited
    ///
    /// A failed status query counts as exited.
    pub fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(status) => status.is_some(),
            Err(e) => {
                log::warn!("Failed to query subprocess status: {e}");
                true
            }
        }
    }

    /// Whether the primary reader task is still running
    #[must_use]
    pub fn primary_alive(&self) -> bool {
        !self.primary.is_finished()
    }

    /// Whether the diagnostic reader task is still running
    #[must_use]
    pub fn diagnostic_alive(&self) -> bool {
        !self.diagnostic.is_finished()
    }

    /// Whether both reader tasks have finished
    #[must_use]
    pub fn readers_done(&self) -> bool {
        self.primary.is_finished() && self.diagnostic.is_finished()
    }

    /// Terminate the child and stop both readers
    ///
    /// Does not wait for the process to exit; the runtime reaps it.
    pub fn kill(mut self) {
        if !self.has_exited() {
            if let Err(e) = self.child.start_kill() {
                log::warn!("Failed to kill subprocess: {e}");
            }
        }
        self.primary.abort();
        self.diagnostic.abort();
    }
}
