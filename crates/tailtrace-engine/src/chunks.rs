use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tailtrace_types::{
    AiChunk, AiMsg, Chunk, ClassifiedMsg, CompactChunk, ContentBlock, DisplayItem, OutputItem,
    SubagentItem, SystemChunk, TeammateItem, ThinkingItem, ToolCallItem, UserChunk, Usage,
    estimate_tokens,
};

/// Tool durations above this are artifacts of background agents delaying
/// unrelated results at the transport layer, not real execution time.
const SLOW_TOOL_SUPPRESS_MS: i64 = 60_000;

const PROMPT_DESC_CHARS: usize = 80;

fn zero_time() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Fold a classified message stream into the visible timeline.
///
/// Consecutive assistant entries (and the tool-result carriers between
/// them) merge into one AI chunk; user, system and compact messages flush
/// the pending buffer and emit their own chunk.
pub fn build_chunks(msgs: &[ClassifiedMsg]) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buffer: Vec<AiMsg> = Vec::new();

    for msg in msgs {
        match msg {
            ClassifiedMsg::Ai(ai) => buffer.push(ai.clone()),
            ClassifiedMsg::Teammate(tm) => {
                // Teammate traffic belongs inside the surrounding AI turn.
                buffer.push(AiMsg {
                    timestamp: tm.timestamp,
                    model: String::new(),
                    text: String::new(),
                    thinking_count: 0,
                    tool_calls: Vec::new(),
                    blocks: vec![ContentBlock::Teammate {
                        text: tm.text.clone(),
                        teammate_id: tm.teammate_id.clone(),
                        color: tm.color.clone(),
                    }],
                    usage: Usage::default(),
                    stop_reason: String::new(),
                    is_meta: true,
                });
            }
            ClassifiedMsg::User(u) => {
                flush_ai(&mut chunks, &mut buffer);
                chunks.push(Chunk::User(UserChunk {
                    timestamp: u.timestamp,
                    text: u.text.clone(),
                    permission_mode: u.permission_mode.clone(),
                }));
            }
            ClassifiedMsg::System(s) => {
                flush_ai(&mut chunks, &mut buffer);
                chunks.push(Chunk::System(SystemChunk {
                    timestamp: s.timestamp,
                    output: s.output.clone(),
                    is_error: s.is_error,
                }));
            }
            ClassifiedMsg::Compact(c) => {
                flush_ai(&mut chunks, &mut buffer);
                chunks.push(Chunk::Compact(CompactChunk {
                    timestamp: c.timestamp,
                    text: c.text.clone(),
                }));
            }
        }
    }
    flush_ai(&mut chunks, &mut buffer);
    chunks
}

fn flush_ai(chunks: &mut Vec<Chunk>, buffer: &mut Vec<AiMsg>) {
    if buffer.is_empty() {
        return;
    }
    chunks.push(Chunk::Ai(merge_ai_buffer(buffer)));
    buffer.clear();
}

fn merge_ai_buffer(buffer: &[AiMsg]) -> AiChunk {
    let text: String = buffer
        .iter()
        .filter(|m| !m.text.is_empty())
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let thinking_count = buffer.iter().map(|m| m.thinking_count).sum();
    let tool_calls = buffer
        .iter()
        .flat_map(|m| m.tool_calls.iter().cloned())
        .collect();

    let model = buffer
        .iter()
        .filter(|m| !m.is_meta)
        .map(|m| m.model.as_str())
        .find(|m| !m.is_empty())
        .unwrap_or("")
        .to_string();
    let stop_reason = buffer
        .iter()
        .rev()
        .filter(|m| !m.is_meta)
        .map(|m| m.stop_reason.as_str())
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string();
    // A snapshot, never a sum: the API reports input tokens as the full
    // context window per call.
    let usage = buffer
        .iter()
        .rev()
        .filter(|m| !m.is_meta && m.usage.total() > 0)
        .map(|m| m.usage)
        .next()
        .unwrap_or_default();

    let first_ts = buffer
        .iter()
        .map(|m| m.timestamp)
        .find(|t| *t != zero_time());
    let last_ts = buffer
        .iter()
        .rev()
        .map(|m| m.timestamp)
        .find(|t| *t != zero_time());
    let timestamp = first_ts.unwrap_or_else(|| buffer.last().map(|m| m.timestamp).unwrap_or_else(zero_time));
    let duration_ms = match (first_ts, last_ts) {
        (Some(first), Some(last)) => (last - first).num_milliseconds(),
        _ => 0,
    };

    let items = build_items(buffer);

    AiChunk {
        timestamp,
        model,
        text,
        thinking_count,
        tool_calls,
        items,
        usage,
        stop_reason,
        duration_ms,
    }
}

struct PendingTool {
    item_idx: usize,
    timestamp: DateTime<Utc>,
}

fn build_items(buffer: &[AiMsg]) -> Vec<DisplayItem> {
    let mut items: Vec<DisplayItem> = Vec::new();
    let mut pending: HashMap<String, PendingTool> = HashMap::new();
    let mut has_subagent = false;

    for msg in buffer {
        for block in &msg.blocks {
            match block {
                ContentBlock::Thinking { text } if !msg.is_meta => {
                    items.push(DisplayItem::Thinking(ThinkingItem {
                        text: text.clone(),
                        token_count: estimate_tokens(text),
                    }));
                }
                ContentBlock::Text { text } if !msg.is_meta => {
                    items.push(DisplayItem::Output(OutputItem {
                        text: text.clone(),
                        token_count: estimate_tokens(text),
                    }));
                }
                ContentBlock::ToolUse {
                    tool_id,
                    tool_name,
                    tool_input,
                } if !msg.is_meta => {
                    let input_tokens =
                        estimate_tokens(&serde_json::to_string(tool_input).unwrap_or_default());
                    let item_idx = items.len();
                    if tool_name == "Task" || tool_name == "Agent" {
                        items.push(DisplayItem::Subagent(SubagentItem {
                            tool_id: tool_id.clone(),
                            tool_name: tool_name.clone(),
                            tool_input: tool_input.clone(),
                            subagent_type: str_key(tool_input, "subagent_type"),
                            subagent_desc: subagent_desc(tool_input),
                            team_member_name: str_key(tool_input, "name"),
                            tool_result: String::new(),
                            tool_error: false,
                            duration_ms: 0,
                            token_count: input_tokens,
                            agent_id: None,
                        }));
                        has_subagent = true;
                    } else {
                        items.push(DisplayItem::ToolCall(ToolCallItem {
                            tool_id: tool_id.clone(),
                            tool_name: tool_name.clone(),
                            tool_input: tool_input.clone(),
                            tool_result: String::new(),
                            tool_error: false,
                            duration_ms: 0,
                            token_count: input_tokens,
                        }));
                    }
                    pending.insert(
                        tool_id.clone(),
                        PendingTool {
                            item_idx,
                            timestamp: msg.timestamp,
                        },
                    );
                }
                ContentBlock::ToolResult {
                    tool_id,
                    content,
                    is_error,
                } => {
                    attach_result(
                        &mut items,
                        &mut pending,
                        tool_id,
                        content,
                        *is_error,
                        msg.timestamp,
                    );
                }
                ContentBlock::Teammate {
                    text,
                    teammate_id,
                    color,
                } => {
                    items.push(DisplayItem::TeammateMessage(TeammateItem {
                        text: text.clone(),
                        teammate_id: teammate_id.clone(),
                        color: color.clone(),
                        token_count: estimate_tokens(text),
                    }));
                }
                _ => {}
            }
        }
    }

    // Background agents delay unrelated tool results, inflating their
    // apparent duration; suppress the artifact, keep real sub-minute values
    // and the Task durations themselves.
    if has_subagent {
        for item in &mut items {
            if let DisplayItem::ToolCall(tc) = item
                && tc.duration_ms > SLOW_TOOL_SUPPRESS_MS
            {
                tc.duration_ms = 0;
            }
        }
    }

    items
}

/// Attach a result to its pending tool-use exactly once; unmatched results
/// surface as standalone output.
fn attach_result(
    items: &mut Vec<DisplayItem>,
    pending: &mut HashMap<String, PendingTool>,
    tool_id: &str,
    content: &str,
    is_error: bool,
    result_ts: DateTime<Utc>,
) {
    let Some(p) = pending.remove(tool_id) else {
        items.push(DisplayItem::Output(OutputItem {
            text: content.to_string(),
            token_count: estimate_tokens(content),
        }));
        return;
    };

    let duration_ms = if p.timestamp != zero_time() && result_ts != zero_time() {
        (result_ts - p.timestamp).num_milliseconds()
    } else {
        0
    };

    match &mut items[p.item_idx] {
        DisplayItem::ToolCall(tc) => {
            tc.tool_result = content.to_string();
            tc.tool_error = is_error;
            tc.duration_ms = duration_ms;
            tc.token_count += estimate_tokens(content);
        }
        DisplayItem::Subagent(sa) => {
            sa.tool_result = content.to_string();
            sa.tool_error = is_error;
            sa.duration_ms = duration_ms;
            sa.token_count += estimate_tokens(content);
        }
        _ => {}
    }
}

fn str_key(input: &serde_json::Value, key: &str) -> String {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn subagent_desc(input: &serde_json::Value) -> String {
    let desc = str_key(input, "description");
    if !desc.is_empty() {
        return desc;
    }
    input
        .get("prompt")
        .and_then(|v| v.as_str())
        .map(|p| p.chars().take(PROMPT_DESC_CHARS).collect())
        .unwrap_or_default()
}
