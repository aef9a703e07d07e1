use serde::Deserialize;
use serde_json::Value;

/// Literal on-disk shape of one JSONL record. Unknown fields are tolerated
/// and ignored; absent fields default so a partial record still decodes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub leaf_uuid: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub is_sidechain: bool,
    /// Upstream writes `null` here for some tool-result carriers, so the
    /// flag is advisory only.
    #[serde(default)]
    pub is_meta: Option<bool>,
    #[serde(default)]
    pub message: Option<RawMessage>,
    /// Object form for native tools, array form for MCP tools. Kept opaque.
    #[serde(default)]
    pub tool_use_result: Value,
    #[serde(rename = "sourceToolUseID", default)]
    pub source_tool_use_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub git_branch: String,
    #[serde(default)]
    pub permission_mode: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub agent_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<RawUsage>,
    /// String or array-of-blocks; stored unparsed.
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}
