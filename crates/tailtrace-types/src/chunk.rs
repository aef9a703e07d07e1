use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::msg::{ToolCall, Usage};

/// Assistant thinking block shown as a collapsed marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingItem {
    pub text: String,
    pub token_count: u64,
}

/// Assistant output text, or an orphaned tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    pub text: String,
    pub token_count: u64,
}

/// A tool invocation with its correlated result, once one arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallItem {
    pub tool_id: String,
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_result: String,
    pub tool_error: bool,
    /// Tool-use timestamp to tool-result timestamp, in milliseconds.
    pub duration_ms: i64,
    pub token_count: u64,
}

/// A sub-agent spawn (`Task`/`Agent` tool use) with its correlated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubagentItem {
    pub tool_id: String,
    pub tool_name: String,
    pub tool_input: Value,
    pub subagent_type: String,
    pub subagent_desc: String,
    /// Present when the spawn names a team member.
    pub team_member_name: String,
    pub tool_result: String,
    pub tool_error: bool,
    pub duration_ms: i64,
    pub token_count: u64,
    /// Filled by the linker: id of the child `SubagentProcess` this spawn
    /// resolved to.
    pub agent_id: Option<String>,
}

impl SubagentItem {
    /// The `{team_name, agent_name}` pair, when this spawn targets a team.
    pub fn team_pair(&self) -> Option<(String, String)> {
        let team = self.tool_input.get("team_name")?.as_str()?;
        let name = self.tool_input.get("name")?.as_str()?;
        Some((team.to_string(), name.to_string()))
    }

    pub fn is_team(&self) -> bool {
        self.team_pair().is_some()
    }
}

/// Message relayed from a teammate agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeammateItem {
    pub text: String,
    pub teammate_id: String,
    pub color: String,
    pub token_count: u64,
}

/// Ordered element inside an AI chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum DisplayItem {
    Thinking(ThinkingItem),
    Output(OutputItem),
    ToolCall(ToolCallItem),
    Subagent(SubagentItem),
    TeammateMessage(TeammateItem),
}

impl DisplayItem {
    pub fn token_count(&self) -> u64 {
        match self {
            DisplayItem::Thinking(i) => i.token_count,
            DisplayItem::Output(i) => i.token_count,
            DisplayItem::ToolCall(i) => i.token_count,
            DisplayItem::Subagent(i) => i.token_count,
            DisplayItem::TeammateMessage(i) => i.token_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserChunk {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub permission_mode: Option<String>,
}

/// One merged assistant turn: consecutive assistant entries folded together
/// with their tool results attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiChunk {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub text: String,
    pub thinking_count: usize,
    pub tool_calls: Vec<ToolCall>,
    pub items: Vec<DisplayItem>,
    pub usage: Usage,
    pub stop_reason: String,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemChunk {
    pub timestamp: DateTime<Utc>,
    pub output: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactChunk {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// One visible unit in the conversation timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
#[serde(rename_all = "snake_case")]
pub enum Chunk {
    User(UserChunk),
    Ai(AiChunk),
    System(SystemChunk),
    Compact(CompactChunk),
}

impl Chunk {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Chunk::User(c) => c.timestamp,
            Chunk::Ai(c) => c.timestamp,
            Chunk::System(c) => c.timestamp,
            Chunk::Compact(c) => c.timestamp,
        }
    }

    pub fn as_ai(&self) -> Option<&AiChunk> {
        match self {
            Chunk::Ai(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_ai_mut(&mut self) -> Option<&mut AiChunk> {
        match self {
            Chunk::Ai(c) => Some(c),
            _ => None,
        }
    }
}
