use std::collections::HashSet;

use serde_json::Value;
use tailtrace_types::{AiChunk, Chunk, DisplayItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActivityEvent {
    Activity,
    Ending,
}

/// Whether the session still appears to be producing activity.
///
/// Computed from the activity sequence of the AI chunks, with an override
/// for pending tool calls: a parent that emitted text after partial
/// sub-agent results is still ongoing while other agents run.
pub fn is_ongoing(chunks: &[Chunk]) -> bool {
    let ai_chunks: Vec<&AiChunk> = chunks.iter().filter_map(|c| c.as_ai()).collect();
    if ai_chunks.is_empty() {
        return false;
    }

    // Legacy sessions assembled without items: fall back to the stop reason.
    if ai_chunks.iter().all(|c| c.items.is_empty()) {
        return ai_chunks
            .last()
            .map(|c| c.stop_reason != "end_turn")
            .unwrap_or(false);
    }

    if has_unresolved_tool(&ai_chunks) {
        return true;
    }

    let events = activity_events(&ai_chunks);
    if events.is_empty() {
        return false;
    }
    match events.iter().rposition(|e| *e == ActivityEvent::Ending) {
        Some(last_ending) => events[last_ending + 1..]
            .iter()
            .any(|e| *e == ActivityEvent::Activity),
        None => events.iter().any(|e| *e == ActivityEvent::Activity),
    }
}

/// A tool call or sub-agent spawn that never received its result, excluding
/// plan exits and shutdown approvals (those legitimately end without one).
fn has_unresolved_tool(ai_chunks: &[&AiChunk]) -> bool {
    for chunk in ai_chunks {
        for item in &chunk.items {
            match item {
                DisplayItem::ToolCall(tc) => {
                    if tc.tool_name == "ExitPlanMode" || is_shutdown_approval(tc) {
                        continue;
                    }
                    if tc.tool_result.is_empty() {
                        return true;
                    }
                }
                DisplayItem::Subagent(sa) => {
                    if sa.tool_result.is_empty() {
                        return true;
                    }
                }
                _ => {}
            }
        }
    }
    false
}

fn activity_events(ai_chunks: &[&AiChunk]) -> Vec<ActivityEvent> {
    let mut events = Vec::new();
    let mut shutdown_ids: HashSet<&str> = HashSet::new();

    for chunk in ai_chunks {
        for item in &chunk.items {
            match item {
                DisplayItem::Thinking(_) => events.push(ActivityEvent::Activity),
                DisplayItem::Output(o) => {
                    if !o.text.is_empty() {
                        events.push(ActivityEvent::Ending);
                    }
                }
                DisplayItem::ToolCall(tc) => {
                    if tc.tool_name == "ExitPlanMode" {
                        events.push(ActivityEvent::Ending);
                        continue;
                    }
                    if is_shutdown_approval(tc) {
                        shutdown_ids.insert(tc.tool_id.as_str());
                        events.push(ActivityEvent::Ending);
                    } else {
                        events.push(ActivityEvent::Activity);
                    }
                    if !tc.tool_result.is_empty() {
                        if shutdown_ids.contains(tc.tool_id.as_str()) {
                            events.push(ActivityEvent::Ending);
                        } else {
                            events.push(ActivityEvent::Activity);
                        }
                    }
                }
                DisplayItem::Subagent(sa) => {
                    events.push(ActivityEvent::Activity);
                    if !sa.tool_result.is_empty() {
                        events.push(ActivityEvent::Activity);
                    }
                }
                DisplayItem::TeammateMessage(_) => {}
            }
        }
    }
    events
}

/// SendMessage call approving a shutdown request.
fn is_shutdown_approval(tc: &tailtrace_types::ToolCallItem) -> bool {
    if tc.tool_name != "SendMessage" {
        return false;
    }
    let payload = tc
        .tool_input
        .get("message")
        .filter(|m| m.is_object())
        .unwrap_or(&tc.tool_input);
    payload.get("type").and_then(Value::as_str) == Some("shutdown_response")
        && payload.get("approve").and_then(Value::as_bool) == Some(true)
}
