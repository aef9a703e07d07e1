use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregated token counters as reported by the upstream API.
///
/// Input tokens are reported as the full context window per call, so a
/// chunk's usage is always a snapshot of one entry, never a sum across
/// entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }
}

/// A tool invocation as seen from the assistant's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
}

/// One element inside a message's content array.
///
/// Unknown block types are retained as `Other` with whatever text they
/// carried, so the timeline never silently loses content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ContentBlock {
    Thinking {
        text: String,
    },
    Text {
        text: String,
    },
    ToolUse {
        tool_id: String,
        tool_name: String,
        /// Raw tool input, preserved for summarisation and linking.
        tool_input: Value,
    },
    ToolResult {
        /// The tool-use id this result links back to.
        tool_id: String,
        content: String,
        is_error: bool,
    },
    Teammate {
        text: String,
        teammate_id: String,
        color: String,
    },
    Other {
        kind: String,
        text: String,
    },
}

/// Genuine user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMsg {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub permission_mode: Option<String>,
}

/// Assistant response, or an internal tool-result carrier when `is_meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMsg {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub text: String,
    pub thinking_count: usize,
    pub tool_calls: Vec<ToolCall>,
    pub blocks: Vec<ContentBlock>,
    pub usage: Usage,
    pub stop_reason: String,
    /// Meta entries never contribute model, stop_reason or usage to a chunk.
    pub is_meta: bool,
}

/// Command or background-task output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMsg {
    pub timestamp: DateTime<Utc>,
    pub output: String,
    pub is_error: bool,
}

/// Inter-agent message received from a team session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeammateMsg {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub teammate_id: String,
    pub color: String,
}

/// Context-compression boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactMsg {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// A transcript entry after classification.
///
/// Only the classifier constructs these; the chunk builder consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
#[serde(rename_all = "snake_case")]
pub enum ClassifiedMsg {
    User(UserMsg),
    Ai(AiMsg),
    System(SystemMsg),
    Teammate(TeammateMsg),
    Compact(CompactMsg),
}

impl ClassifiedMsg {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ClassifiedMsg::User(m) => m.timestamp,
            ClassifiedMsg::Ai(m) => m.timestamp,
            ClassifiedMsg::System(m) => m.timestamp,
            ClassifiedMsg::Teammate(m) => m.timestamp,
            ClassifiedMsg::Compact(m) => m.timestamp,
        }
    }
}
