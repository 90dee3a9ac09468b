//! Stream message parsing
//!
//! - [`fields`] - scalar field extraction, the only scanning primitive
//! - [`content`] - assistant content-block heuristics
//! - [`parser`] - routing of one line to typed events

pub mod content;
pub mod fields;
pub mod parser;

pub use parser::{ParseError, THINKING_MARKER, parse_line};
