//! Tests for the stream line parser and field extraction
//!
//! Lines are written the way the CLI emits them: one compact JSON object per
//! line.

use claude_session::message::content::{first_tool_name, text_blocks};
use claude_session::message::fields::{FieldValue, find_field, unescape};
use claude_session::{Completion, ParseError, SessionId, StreamEvent, ToolName, parse_line};

#[test]
fn test_init_line() {
    let events = parse_line(r#"{"type":"system","subtype":"init","session_id":"sess-42","tools":[]}"#).unwrap();
    assert_eq!(
        events,
        [StreamEvent::Init {
            session_id: SessionId::new("sess-42")
        }]
    );
}

#[test]
fn test_init_without_session_id_is_a_parse_failure() {
    let err = parse_line(r#"{"type":"system","subtype":"init"}"#).unwrap_err();
    assert_eq!(
        err,
        ParseError::MissingField {
            message_type: "system/init",
            field: "session_id"
        }
    );
}

#[test]
fn test_other_system_subtypes_pass_through() {
    let events = parse_line(r#"{"type":"system","subtype":"compact_boundary"}"#).unwrap();
    assert_eq!(
        events,
        [StreamEvent::Unknown {
            message_type: "system/compact_boundary".to_string()
        }]
    );
}

#[test]
fn test_unknown_type_passes_through() {
    let events = parse_line(r#"{"type":"stream_event","event":{}}"#).unwrap();
    assert_eq!(
        events,
        [StreamEvent::Unknown {
            message_type: "stream_event".to_string()
        }]
    );
}

#[test]
fn test_not_an_object() {
    assert!(matches!(parse_line("Loading..."), Err(ParseError::NotAnObject(_))));
    assert_eq!(parse_line(r#"{"subtype":"init"}"#), Err(ParseError::MissingType));
    assert_eq!(parse_line("   "), Ok(Vec::new()));
}

#[test]
fn test_assistant_text_then_tool_use() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Let me look.\nOne sec"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"a.rs"}}]}}"#;
    let events = parse_line(line).unwrap();
    assert_eq!(
        events,
        [
            StreamEvent::AssistantText {
                chunk: "Let me look.\nOne sec".to_string()
            },
            StreamEvent::ToolUse {
                name: ToolName::new("Read")
            },
        ]
    );
}

#[test]
fn test_only_first_tool_use_is_reported() {
    for (first, second) in [("Bash", "Edit"), ("Grep", "Grep"), ("mcp__fs__read", "Write")] {
        let line = format!(
            r#"{{"type":"assistant","message":{{"content":[{{"type":"tool_use","id":"a","name":"{first}","input":{{"name":"decoy"}}}},{{"type":"tool_use","id":"b","name":"{second}","input":{{}}}}]}}}}"#
        );
        assert_eq!(first_tool_name(&line).as_deref(), Some(first), "line: {line}");

        let tools: Vec<_> = parse_line(&line)
            .unwrap()
            .into_iter()
            .filter(|event| matches!(event, StreamEvent::ToolUse { .. }))
            .collect();
        assert_eq!(
            tools,
            [StreamEvent::ToolUse {
                name: ToolName::new(first)
            }]
        );
    }
}

#[test]
fn test_multiple_text_blocks_in_order() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"one"},{"type":"text","text":"two"}]}}"#;
    assert_eq!(text_blocks(line), ["one", "two"]);
}

#[test]
fn test_text_marker_without_text_field_does_not_borrow_next_block() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"text"},{"type":"tool_use","name":"Bash","input":{"text":"ls"}}]}}"#;
    assert!(text_blocks(line).is_empty());
}

#[test]
fn test_tool_result_variants() {
    let top = parse_line(r#"{"type":"tool_result","is_error":true,"content":"exit 1"}"#).unwrap();
    assert_eq!(
        top,
        [StreamEvent::ToolResult {
            is_error: true,
            content: "exit 1".to_string()
        }]
    );

    let user = parse_line(r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"ok","is_error":false}]}}"#).unwrap();
    assert_eq!(
        user,
        [StreamEvent::ToolResult {
            is_error: false,
            content: "ok".to_string()
        }]
    );

    let plain_user = parse_line(r#"{"type":"user","message":{"role":"user","content":"hi"}}"#).unwrap();
    assert!(plain_user.is_empty());
}

#[test]
fn test_result_line() {
    let line = r#"{"type":"result","subtype":"success","is_error":false,"session_id":"sess-42","total_cost_usd":0.0123,"num_turns":3,"usage":{"input_tokens":1200,"output_tokens":300}}"#;
    let events = parse_line(line).unwrap();
    assert_eq!(
        events,
        [StreamEvent::Completion(Completion {
            session_id: Some(SessionId::new("sess-42")),
            cost_usd: Some(0.0123),
            turns: Some(3),
            tokens_in: Some(1200),
            tokens_out: Some(300),
            is_error: false,
        })]
    );
}

#[test]
fn test_result_error_subtype_and_quoted_turns() {
    let line = r#"{"type":"result","subtype":"error_max_turns","session_id":"s","num_turns":"1"}"#;
    let events = parse_line(line).unwrap();
    let [StreamEvent::Completion(completion)] = events.as_slice() else {
        panic!("expected one completion");
    };
    assert!(completion.is_error);
    assert_eq!(completion.turns, Some(1));
    assert_eq!(completion.tokens_in, None);
}

#[test]
fn test_error_payload_shapes() {
    let string = parse_line(r#"{"type":"error","error":"rate limited"}"#).unwrap();
    let object = parse_line(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#).unwrap();
    let empty = parse_line(r#"{"type":"error"}"#).unwrap();

    let messages: Vec<_> = [string, object, empty]
        .into_iter()
        .flatten()
        .map(|event| match event {
            StreamEvent::Error { message } => message,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(messages, ["rate limited", "Overloaded", "unknown error"]);
}

#[test]
fn test_thinking_marker() {
    assert_eq!(parse_line(r#"{"type":"thinking"}"#).unwrap(), [StreamEvent::Thinking]);
}

#[test]
fn test_field_value_shapes() {
    let line = r#"{"quoted":"say \"hi\"\tnow\\then","nothing":null,"count":42,"flag":true,"spaced" :  false}"#;

    assert_eq!(
        find_field(line, "quoted"),
        Some(FieldValue::Str("say \"hi\"\tnow\\then".to_string()))
    );
    assert_eq!(find_field(line, "nothing"), Some(FieldValue::Null));
    assert_eq!(find_field(line, "count").and_then(|v| v.as_u64()), Some(42));
    assert_eq!(find_field(line, "flag").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(find_field(line, "spaced").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(find_field(line, "missing"), None);
}

#[test]
fn test_key_inside_string_value_is_not_a_key() {
    let line = r#"{"note":"the \"type\" word","type":"thinking"}"#;
    assert_eq!(find_field(line, "type"), Some(FieldValue::Str("thinking".to_string())));
}

#[test]
fn test_unescape_keeps_other_escapes() {
    assert_eq!(unescape(r#"a\nb\tc\"d\\e"#), "a\nb\tc\"d\\e");
    assert_eq!(unescape(r"café \/"), r"café \/");
}

#[test]
fn test_remaining_context() {
    let completion = Completion {
        tokens_in: Some(150_000),
        tokens_out: Some(20_000),
        ..Completion::default()
    };
    assert_eq!(completion.remaining_context(200_000), Some(30_000));
    assert!(completion.summary(200_000).contains("context remaining: ~30000"));

    let over = Completion {
        tokens_in: Some(190_000),
        tokens_out: Some(20_000),
        ..Completion::default()
    };
    assert_eq!(over.remaining_context(200_000), Some(0));

    let partial = Completion {
        tokens_in: Some(10),
        ..Completion::default()
    };
    assert_eq!(partial.remaining_context(200_000), None);
    assert!(!partial.summary(200_000).contains("context remaining"));
}
