//! CLI command building logic for subprocess transport

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::types::identifiers::SessionId;
use crate::types::options::SessionOptions;

use super::config::API_KEY_ENV_VAR;

/// Command builder for one turn of the Claude CLI
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    prompt: &'a str,
    resume: Option<&'a SessionId>,
    options: &'a SessionOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(cli_path: &'a Path, prompt: &'a str, options: &'a SessionOptions) -> Self {
        Self {
            cli_path,
            prompt,
            resume: None,
            options,
        }
    }

    /// Continue the conversation with this session id
    #[must_use]
    pub fn resume(mut self, session_id: Option<&'a SessionId>) -> Self {
        self.resume = session_id.filter(|id| !id.is_empty());
        self
    }

    /// Build the complete CLI command with stdio and environment set up
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);

        // Base arguments
        cmd.arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose");

        cmd.arg("--max-turns")
            .arg(self.options.max_turns.to_string())
            .arg("--dangerously-skip-permissions");

        if let Some(session_id) = self.resume {
            cmd.arg("--resume").arg(session_id.as_str());
        }

        cmd.arg("--").arg(self.prompt);

        cmd.env_remove(API_KEY_ENV_VAR);
        cmd.envs(&self.options.extra_env);

        if let Some(ref cwd) = self.options.cwd {
            cmd.current_dir(cwd);
        }

        // Pipe stderr rather than inheriting it so the child cannot touch the terminal.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_fresh_turn_arguments() {
        let options = SessionOptions::default();
        let cmd = CommandBuilder::new(Path::new("claude"), "fix the bug", &options).build();
        let args = args(&cmd);

        assert_eq!(&args[..4], ["--print", "--output-format", "stream-json", "--verbose"]);
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
        assert!(!args.contains(&"--resume".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("fix the bug"));
    }

    #[test]
    fn test_resume_and_max_turns() {
        let options = SessionOptions {
            max_turns: 7,
            ..SessionOptions::default()
        };
        let id = SessionId::new("abc123");
        let cmd = CommandBuilder::new(Path::new("claude"), "go on", &options)
            .resume(Some(&id))
            .build();
        let args = args(&cmd);

        let turns = args.iter().position(|a| a == "--max-turns").unwrap();
        assert_eq!(args[turns + 1], "7");
        let resume = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[resume + 1], "abc123");
    }

    #[test]
    fn test_empty_session_id_is_not_resumed() {
        let options = SessionOptions::default();
        let id = SessionId::default();
        let cmd = CommandBuilder::new(Path::new("claude"), "hi", &options)
            .resume(Some(&id))
            .build();
        assert!(!args(&cmd).contains(&"--resume".to_string()));
    }

    #[test]
    fn test_api_key_removed_from_environment() {
        let options = SessionOptions::default();
        let cmd = CommandBuilder::new(Path::new("claude"), "hi", &options).build();
        let removed = cmd
            .as_std()
            .get_envs()
            .any(|(key, value)| key == API_KEY_ENV_VAR && value.is_none());
        assert!(removed);
    }
}
