use serde_json::Value;
use tailtrace_types::{
    AiMsg, ClassifiedMsg, CompactMsg, ContentBlock, SystemMsg, TeammateMsg, ToolCall, UserMsg,
};

use crate::decode::Entry;
use crate::sanitize::{
    self, EMPTY_STDERR, EMPTY_STDOUT, bash_output, extract_text, is_hard_noise,
    local_command_output, task_notification, teammate_attrs,
};

const SYNTHETIC_MODEL: &str = "<synthetic>";
const INTERRUPT_PREFIX: &str = "[Request interrupted by user";

/// Teammate protocol chatter that never surfaces in the timeline.
const PROTOCOL_TYPES: [&str; 4] = [
    "idle_notification",
    "shutdown_approved",
    "teammate_terminated",
    "task_assignment",
];

/// Map one entry to a classified message, or drop it as noise.
///
/// Decision order matters: the first matching rule wins.
pub fn classify(entry: &Entry) -> Option<ClassifiedMsg> {
    if entry.is_sidechain {
        return None;
    }
    match entry.kind.as_str() {
        "system" | "file-history-snapshot" | "queue-operation" | "progress" => return None,
        "summary" => {
            return Some(ClassifiedMsg::Compact(CompactMsg {
                timestamp: entry.timestamp,
                text: entry.summary.clone(),
            }));
        }
        _ => {}
    }

    if entry.kind == "assistant" {
        if entry.model == SYNTHETIC_MODEL {
            return None;
        }
        return Some(ClassifiedMsg::Ai(assistant_msg(entry)));
    }

    if entry.kind == "user" {
        match classify_user(entry) {
            UserVerdict::Drop => return None,
            UserVerdict::Msg(msg) => return Some(msg),
            UserVerdict::Carrier => {}
        }
    }

    // Tool-result carriers and unknown entry types. `is_meta` is advisory
    // (upstream writes null for some carriers), so detection is by shape.
    Some(ClassifiedMsg::Ai(meta_carrier(entry)))
}

enum UserVerdict {
    Drop,
    Msg(ClassifiedMsg),
    Carrier,
}

fn classify_user(entry: &Entry) -> UserVerdict {
    let raw = extract_text(&entry.content);
    let trimmed = raw.trim();

    if is_hard_noise(trimmed) {
        return UserVerdict::Drop;
    }
    if trimmed == EMPTY_STDOUT || trimmed == EMPTY_STDERR {
        return UserVerdict::Drop;
    }
    if interrupted(&entry.content) {
        return UserVerdict::Drop;
    }

    if trimmed.starts_with("<teammate-message")
        && let Some(attrs) = teammate_attrs(trimmed)
    {
        if is_protocol_chatter(&attrs.body) {
            return UserVerdict::Drop;
        }
        return UserVerdict::Msg(ClassifiedMsg::Teammate(TeammateMsg {
            timestamp: entry.timestamp,
            text: attrs.body,
            teammate_id: attrs.teammate_id,
            color: attrs.color,
        }));
    }

    let system_out = local_command_output(trimmed)
        .or_else(|| bash_output(trimmed))
        .or_else(|| task_notification(trimmed));
    if let Some(out) = system_out {
        return UserVerdict::Msg(ClassifiedMsg::System(SystemMsg {
            timestamp: entry.timestamp,
            output: out.text,
            is_error: out.is_error,
        }));
    }

    if !entry.meta_flag() && has_user_content(&entry.content) {
        let mut text = sanitize::sanitize_content(&raw);
        if text.is_empty() && has_image_block(&entry.content) {
            text = "[image]".to_string();
        }
        if !text.is_empty() {
            return UserVerdict::Msg(ClassifiedMsg::User(UserMsg {
                timestamp: entry.timestamp,
                text,
                permission_mode: if entry.permission_mode.is_empty() {
                    None
                } else {
                    Some(entry.permission_mode.clone())
                },
            }));
        }
    }

    UserVerdict::Carrier
}

fn has_image_block(content: &Value) -> bool {
    content
        .as_array()
        .is_some_and(|blocks| {
            blocks
                .iter()
                .any(|b| b.get("type").and_then(|t| t.as_str()) == Some("image"))
        })
}

fn interrupted(content: &Value) -> bool {
    match content {
        Value::String(s) => s.trim_start().starts_with(INTERRUPT_PREFIX),
        Value::Array(blocks) if blocks.len() == 1 => blocks[0]
            .get("text")
            .and_then(|t| t.as_str())
            .map(|t| t.trim_start().starts_with(INTERRUPT_PREFIX))
            .unwrap_or(false),
        _ => false,
    }
}

fn is_protocol_chatter(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    value
        .get("type")
        .and_then(|t| t.as_str())
        .map(|t| PROTOCOL_TYPES.contains(&t))
        .unwrap_or(false)
}

/// Real user content: a non-empty string, or an array with text or image
/// blocks (tool-result-only arrays are carriers, not user input).
fn has_user_content(content: &Value) -> bool {
    match content {
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(blocks) => blocks.iter().any(|b| {
            match b.get("type").and_then(|t| t.as_str()) {
                Some("text") => b
                    .get("text")
                    .and_then(|t| t.as_str())
                    .map(|t| !t.trim().is_empty())
                    .unwrap_or(false),
                Some("image") => true,
                _ => false,
            }
        }),
        _ => false,
    }
}

fn assistant_msg(entry: &Entry) -> AiMsg {
    let blocks = extract_blocks(&entry.content);
    let text: String = blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    let thinking_count = blocks
        .iter()
        .filter(|b| matches!(b, ContentBlock::Thinking { .. }))
        .count();
    let tool_calls = blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse {
                tool_id, tool_name, ..
            } => Some(ToolCall {
                id: tool_id.clone(),
                name: tool_name.clone(),
            }),
            _ => None,
        })
        .collect();

    AiMsg {
        timestamp: entry.timestamp,
        model: entry.model.clone(),
        text,
        thinking_count,
        tool_calls,
        blocks,
        usage: entry.usage,
        stop_reason: entry.stop_reason.clone(),
        is_meta: false,
    }
}

fn meta_carrier(entry: &Entry) -> AiMsg {
    let mut blocks: Vec<ContentBlock> = Vec::new();
    if let Value::Array(items) = &entry.content {
        for item in items {
            if item.get("type").and_then(|t| t.as_str()) == Some("tool_result") {
                blocks.push(tool_result_block(item));
            }
        }
    }
    if blocks.is_empty() {
        // No structured payload: keep the text so downstream can ignore it.
        blocks.push(ContentBlock::Text {
            text: extract_text(&entry.content),
        });
    }

    AiMsg {
        timestamp: entry.timestamp,
        model: String::new(),
        text: String::new(),
        thinking_count: 0,
        tool_calls: Vec::new(),
        blocks,
        usage: Default::default(),
        stop_reason: String::new(),
        is_meta: true,
    }
}

/// Structured blocks from assistant content, order and type preserved.
fn extract_blocks(content: &Value) -> Vec<ContentBlock> {
    let items = match content {
        Value::String(s) => {
            return vec![ContentBlock::Text { text: s.clone() }];
        }
        Value::Array(items) => items,
        _ => return Vec::new(),
    };

    items
        .iter()
        .map(|item| {
            let kind = item.get("type").and_then(|t| t.as_str()).unwrap_or("");
            match kind {
                "thinking" => ContentBlock::Thinking {
                    text: item
                        .get("thinking")
                        .or_else(|| item.get("text"))
                        .and_then(|t| t.as_str())
                        .unwrap_or("")
                        .to_string(),
                },
                "text" => ContentBlock::Text {
                    text: item
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or("")
                        .to_string(),
                },
                "tool_use" => ContentBlock::ToolUse {
                    tool_id: item
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    tool_name: item
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    tool_input: item.get("input").cloned().unwrap_or(Value::Null),
                },
                "tool_result" => tool_result_block(item),
                other => ContentBlock::Other {
                    kind: other.to_string(),
                    text: item
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or("")
                        .to_string(),
                },
            }
        })
        .collect()
}

fn tool_result_block(item: &Value) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_id: item
            .get("tool_use_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        content: stringify_result_content(item.get("content")),
        is_error: item
            .get("is_error")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }
}

/// Tool-result content may itself be a string or an array of text blocks.
fn stringify_result_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(v @ Value::Array(_)) => extract_text(v),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::parse_entry;

    fn classify_line(line: &str) -> Option<ClassifiedMsg> {
        classify(&parse_entry(line).expect("entry should decode"))
    }

    #[test]
    fn test_sidechain_dropped() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","isSidechain":true,"message":{"content":"hi"}}"#,
        );
        assert!(msg.is_none());
    }

    #[test]
    fn test_noise_types_dropped() {
        for kind in ["system", "file-history-snapshot", "queue-operation", "progress"] {
            let line = format!(r#"{{"type":"{kind}","uuid":"u1"}}"#);
            assert!(classify_line(&line).is_none(), "{kind} should drop");
        }
    }

    #[test]
    fn test_summary_becomes_compact() {
        let msg = classify_line(r#"{"type":"summary","leafUuid":"l1","summary":"Earlier context"}"#);
        match msg {
            Some(ClassifiedMsg::Compact(c)) => assert_eq!(c.text, "Earlier context"),
            other => panic!("expected compact, got {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_assistant_dropped() {
        let msg = classify_line(
            r#"{"type":"assistant","uuid":"a1","message":{"role":"assistant","model":"<synthetic>","content":[{"type":"text","text":"x"}]}}"#,
        );
        assert!(msg.is_none());
    }

    #[test]
    fn test_hard_noise_user_dropped() {
        assert!(classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"<system-reminder>tick</system-reminder>"}}"#
        )
        .is_none());
        assert!(classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"<local-command-stdout></local-command-stdout>"}}"#
        )
        .is_none());
    }

    #[test]
    fn test_interrupt_dropped_in_both_forms() {
        assert!(classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"[Request interrupted by user]"}}"#
        )
        .is_none());
        assert!(classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":[{"type":"text","text":"[Request interrupted by user for tool use]"}]}}"#
        )
        .is_none());
    }

    #[test]
    fn test_teammate_message_classified() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"<teammate-message teammate_id=\"lead\" color=\"cyan\">status?</teammate-message>"}}"#,
        );
        match msg {
            Some(ClassifiedMsg::Teammate(t)) => {
                assert_eq!(t.teammate_id, "lead");
                assert_eq!(t.color, "cyan");
                assert_eq!(t.text, "status?");
            }
            other => panic!("expected teammate, got {other:?}"),
        }
    }

    #[test]
    fn test_teammate_protocol_chatter_dropped() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"<teammate-message teammate_id=\"w\">{\"type\":\"idle_notification\"}</teammate-message>"}}"#,
        );
        assert!(msg.is_none());
    }

    #[test]
    fn test_command_output_becomes_system() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"<local-command-stdout>ls\n</local-command-stdout>"}}"#,
        );
        match msg {
            Some(ClassifiedMsg::System(s)) => {
                assert_eq!(s.output, "ls");
                assert!(!s.is_error);
            }
            other => panic!("expected system, got {other:?}"),
        }
    }

    #[test]
    fn test_stderr_marks_system_error() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":"<local-command-stderr>fatal: not a repo</local-command-stderr>"}}"#,
        );
        match msg {
            Some(ClassifiedMsg::System(s)) => assert!(s.is_error),
            other => panic!("expected system, got {other:?}"),
        }
    }

    #[test]
    fn test_genuine_user_message() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","permissionMode":"plan","message":{"content":"fix the bug"}}"#,
        );
        match msg {
            Some(ClassifiedMsg::User(u)) => {
                assert_eq!(u.text, "fix the bug");
                assert_eq!(u.permission_mode.as_deref(), Some("plan"));
            }
            other => panic!("expected user, got {other:?}"),
        }
    }

    #[test]
    fn test_assistant_blocks_extracted() {
        let msg = classify_line(
            r#"{"type":"assistant","uuid":"a1","message":{"role":"assistant","model":"claude-test-1","stop_reason":"tool_use","content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"Running it"},{"type":"tool_use","id":"toolu_1","name":"Bash","input":{"command":"ls"}}],"usage":{"input_tokens":9,"output_tokens":3}}}"#,
        );
        match msg {
            Some(ClassifiedMsg::Ai(ai)) => {
                assert!(!ai.is_meta);
                assert_eq!(ai.model, "claude-test-1");
                assert_eq!(ai.text, "Running it");
                assert_eq!(ai.thinking_count, 1);
                assert_eq!(ai.tool_calls.len(), 1);
                assert_eq!(ai.tool_calls[0].name, "Bash");
                assert_eq!(ai.blocks.len(), 3);
                assert_eq!(ai.stop_reason, "tool_use");
                assert_eq!(ai.usage.input_tokens, 9);
            }
            other => panic!("expected ai, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_block_kind_retained() {
        let msg = classify_line(
            r#"{"type":"assistant","uuid":"a1","message":{"role":"assistant","model":"m","content":[{"type":"redacted_thinking","text":"x"}]}}"#,
        );
        match msg {
            Some(ClassifiedMsg::Ai(ai)) => {
                assert_eq!(
                    ai.blocks[0],
                    ContentBlock::Other {
                        kind: "redacted_thinking".to_string(),
                        text: "x".to_string()
                    }
                );
            }
            other => panic!("expected ai, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_carrier_without_meta_flag() {
        // isMeta is absent entirely; detection must go by shape.
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":[{"type":"tool_result","tool_use_id":"toolu_abc","content":[{"type":"text","text":"On branch main"}]}]}}"#,
        );
        match msg {
            Some(ClassifiedMsg::Ai(ai)) => {
                assert!(ai.is_meta);
                assert_eq!(
                    ai.blocks[0],
                    ContentBlock::ToolResult {
                        tool_id: "toolu_abc".to_string(),
                        content: "On branch main".to_string(),
                        is_error: false,
                    }
                );
            }
            other => panic!("expected meta carrier, got {other:?}"),
        }
    }

    #[test]
    fn test_image_only_content_is_user_message() {
        let msg = classify_line(
            r#"{"type":"user","uuid":"u1","message":{"content":[{"type":"image","source":{"type":"base64","data":"aGk="}}]}}"#,
        );
        match msg {
            Some(ClassifiedMsg::User(u)) => assert_eq!(u.text, "[image]"),
            other => panic!("expected user, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_falls_back_to_carrier() {
        let msg = classify_line(r#"{"type":"banner","uuid":"u1","message":{"content":"hello"}}"#);
        match msg {
            Some(ClassifiedMsg::Ai(ai)) => assert!(ai.is_meta),
            other => panic!("expected carrier, got {other:?}"),
        }
    }
}
