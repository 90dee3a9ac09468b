//! Subprocess plumbing for the Claude Code CLI

pub mod command;
pub mod config;
pub mod process;
pub mod reader;

pub use command::CommandBuilder;
pub use process::{ProcessHandle, find_cli};
