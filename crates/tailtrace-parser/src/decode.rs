use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tailtrace_types::Usage;

use crate::schema::RawEntry;

/// Sentinel for unparseable timestamps.
pub fn zero_time() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Parse an ISO-8601 timestamp: RFC 3339 first (second or nano precision),
/// then the no-timezone fallback. Failure yields the zero time.
pub fn parse_timestamp(ts: &str) -> DateTime<Utc> {
    if ts.is_empty() {
        return zero_time();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f") {
        return Utc.from_utc_datetime(&naive);
    }
    zero_time()
}

/// One decoded transcript record with its message fields flattened.
#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: String,
    pub uuid: String,
    pub leaf_uuid: String,
    pub timestamp: DateTime<Utc>,
    pub is_sidechain: bool,
    pub is_meta: Option<bool>,
    pub role: String,
    pub model: String,
    pub stop_reason: String,
    pub usage: Usage,
    /// Raw `message.content`: string or array-of-blocks.
    pub content: Value,
    /// Raw `toolUseResult`: object, array (MCP tools) or absent.
    pub tool_use_result: Value,
    pub source_tool_use_id: String,
    pub summary: String,
    pub cwd: String,
    pub git_branch: String,
    pub permission_mode: String,
    pub team_name: String,
    pub agent_name: String,
}

impl Entry {
    /// Advisory meta flag; absent counts as false.
    pub fn meta_flag(&self) -> bool {
        self.is_meta.unwrap_or(false)
    }

    /// Object view of `toolUseResult`. The array form carries no linkable
    /// agent metadata, so it reads as absent.
    pub fn tool_use_result_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.tool_use_result.as_object()
    }
}

/// Decode one JSONL line. `None` on parse failure or when the record lacks
/// both `uuid` and `leafUuid`.
pub fn parse_entry(line: &str) -> Option<Entry> {
    let raw: RawEntry = serde_json::from_str(line).ok()?;
    if raw.uuid.is_empty() && raw.leaf_uuid.is_empty() {
        return None;
    }
    let message = raw.message.unwrap_or_default();
    let usage = message
        .usage
        .map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            cache_read_tokens: u.cache_read_input_tokens,
            cache_creation_tokens: u.cache_creation_input_tokens,
        })
        .unwrap_or_default();

    Some(Entry {
        kind: raw.kind,
        uuid: raw.uuid,
        leaf_uuid: raw.leaf_uuid,
        timestamp: parse_timestamp(&raw.timestamp),
        is_sidechain: raw.is_sidechain,
        is_meta: raw.is_meta,
        role: message.role,
        model: message.model,
        stop_reason: message.stop_reason.unwrap_or_default(),
        usage,
        content: message.content,
        tool_use_result: raw.tool_use_result,
        source_tool_use_id: raw.source_tool_use_id,
        summary: raw.summary,
        cwd: raw.cwd,
        git_branch: raw.git_branch,
        permission_mode: raw.permission_mode,
        team_name: raw.team_name,
        agent_name: raw.agent_name,
    })
}
