//! Transport layer
//!
//! The CLI runs one subprocess per turn; its stdout carries the NDJSON event
//! stream and its stderr carries free-text diagnostics.

pub mod subprocess;

pub use subprocess::{ProcessHandle, find_cli};
