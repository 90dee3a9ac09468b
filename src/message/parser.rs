//! Line parser for the Claude Code CLI stream
//!
//! Turns one NDJSON line from the primary channel into the [`StreamEvent`]s it
//! carries. Routing is by the top-level `type` field; each known type reads
//! only the handful of fields the session manager needs.

use thiserror::Error;

use crate::types::events::{Completion, StreamEvent};
use crate::types::identifiers::{SessionId, ToolName};

use super::content::{first_tool_name, text_blocks};
use super::fields::{FieldValue, find_field, find_field_from, find_type_marker};

/// `type` value of the activity marker sent before the model composes a reply
pub const THINKING_MARKER: &str = "thinking";

/// Reasons a line could not be turned into events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not look like a JSON object
    #[error("line is not a JSON object: {0}")]
    NotAnObject(String),

    /// The object has no `type` field
    #[error("message has no type field")]
    MissingType,

    /// A known message type lacks a required field
    #[error("{message_type} message is missing `{field}`")]
    MissingField {
        /// Message type being parsed
        message_type: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// The line exceeded the configured length limit
    #[error("line exceeded {0} bytes")]
    LineTooLong(usize),
}

/// Parse a single line into the events it carries
///
/// Blank lines yield no events. An assistant line can yield several events:
/// one [`StreamEvent::AssistantText`] per text block followed by at most one
/// [`StreamEvent::ToolUse`] for the first tool invocation on the line.
///
/// # Errors
/// Returns `ParseError` if the line is not an object, has no `type`, or a
/// known message type is missing a required field
pub fn parse_line(line: &str) -> Result<Vec<StreamEvent>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    if !line.starts_with('{') {
        return Err(ParseError::NotAnObject(preview(line)));
    }

    let message_type = find_field(line, "type")
        .and_then(|value| value.as_str().map(str::to_string))
        .ok_or(ParseError::MissingType)?;

    match message_type.as_str() {
        "system" => parse_system(line).map(|event| vec![event]),
        THINKING_MARKER => Ok(vec![StreamEvent::Thinking]),
        "assistant" => Ok(parse_assistant(line)),
        "user" => Ok(parse_user(line).into_iter().collect()),
        "tool_result" => Ok(vec![tool_result_from(line, 0)]),
        "result" => Ok(vec![StreamEvent::Completion(parse_result(line))]),
        "error" => Ok(vec![parse_error(line)]),
        _ => Ok(vec![StreamEvent::Unknown { message_type }]),
    }
}

fn parse_system(line: &str) -> Result<StreamEvent, ParseError> {
    let subtype = find_field(line, "subtype")
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();

    if subtype != "init" {
        return Ok(StreamEvent::Unknown {
            message_type: format!("system/{subtype}"),
        });
    }

    let session_id = non_empty_string(line, "session_id").ok_or(ParseError::MissingField {
        message_type: "system/init",
        field: "session_id",
    })?;

    Ok(StreamEvent::Init {
        session_id: SessionId::new(session_id),
    })
}

fn parse_assistant(line: &str) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = text_blocks(line)
        .into_iter()
        .map(|chunk| StreamEvent::AssistantText { chunk })
        .collect();

    if let Some(name) = first_tool_name(line) {
        events.push(StreamEvent::ToolUse {
            name: ToolName::new(name),
        });
    }

    events
}

/// `user` messages only matter when they carry a tool result block
fn parse_user(line: &str) -> Option<StreamEvent> {
    let marker_end = find_type_marker(line, "tool_result", 0)?;
    Some(tool_result_from(line, marker_end))
}

fn tool_result_from(line: &str, from: usize) -> StreamEvent {
    let is_error = find_field_from(line, "is_error", from)
        .and_then(|field| field.value.as_bool())
        .unwrap_or(false);
    let content = find_field_from(line, "content", from)
        .and_then(|field| match field.value {
            FieldValue::Str(text) => Some(text),
            _ => None,
        })
        .unwrap_or_default();

    StreamEvent::ToolResult { is_error, content }
}

fn parse_result(line: &str) -> Completion {
    let subtype_failed = find_field(line, "subtype")
        .and_then(|value| value.as_str().map(|s| s != "success"))
        .unwrap_or(false);
    let flagged = find_field(line, "is_error")
        .and_then(|value| value.as_bool())
        .unwrap_or(false);

    Completion {
        session_id: non_empty_string(line, "session_id").map(SessionId::new),
        cost_usd: find_field(line, "total_cost_usd").and_then(|value| value.as_f64()),
        turns: find_field(line, "num_turns")
            .and_then(|value| value.as_u64())
            .and_then(|turns| u32::try_from(turns).ok()),
        tokens_in: find_field(line, "input_tokens").and_then(|value| value.as_u64()),
        tokens_out: find_field(line, "output_tokens").and_then(|value| value.as_u64()),
        is_error: subtype_failed || flagged,
    }
}

/// `error` may be a plain string or an object carrying `message`
fn parse_error(line: &str) -> StreamEvent {
    let message = match find_field_from(line, "error", 0) {
        Some(field) => match field.value {
            FieldValue::Str(text) => Some(text),
            FieldValue::Nested => find_field_from(line, "message", field.end)
                .and_then(|inner| inner.value.as_str().map(str::to_string)),
            _ => None,
        },
        None => find_field(line, "message").and_then(|value| value.as_str().map(str::to_string)),
    };

    StreamEvent::Error {
        message: message.unwrap_or_else(|| "unknown error".to_string()),
    }
}

fn non_empty_string(line: &str, key: &str) -> Option<String> {
    match find_field(line, key)? {
        FieldValue::Str(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}

/// Short prefix of an offending line for error messages
fn preview(line: &str) -> String {
    const MAX_PREVIEW_CHARS: usize = 80;
    line.chars().take(MAX_PREVIEW_CHARS).collect()
}
