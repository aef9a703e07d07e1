use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::msg::Usage;

/// A parsed child session plus the fields the link phases fill in later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentProcess {
    /// Hex id for sidechain agents, `"<agent>@<team>"` for team members.
    pub id: String,
    pub path: PathBuf,
    pub chunks: Vec<Chunk>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    /// Snapshot from the child's last AI chunk.
    pub usage: Usage,

    /// Tool-use id of the parent's spawning item, once linked.
    pub parent_task_id: Option<String>,
    pub description: String,
    pub subagent_type: String,
    /// `summary` attribute of the child's opening teammate-message wrapper.
    pub team_summary: Option<String>,
    pub team_color: Option<String>,
    pub agent_name: Option<String>,
    pub team_name: Option<String>,
}

impl SubagentProcess {
    pub fn is_linked(&self) -> bool {
        self.parent_task_id.is_some()
    }
}

/// Picker record for one session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub path: PathBuf,
    pub session_id: String,
    pub mtime: SystemTime,
    pub first_msg: String,
    pub turn_count: usize,
    pub total_tokens: u64,
    pub duration_ms: i64,
    pub model: String,
    pub is_ongoing: bool,
}

/// One task on a reconstructed team board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTask {
    /// Sequential within the team, "1"-based; resets on each new team.
    pub id: String,
    pub subject: String,
    pub status: String,
    pub owner: String,
}

/// Final state of a team board replayed from lead and worker transcripts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub name: String,
    pub description: String,
    pub tasks: Vec<TeamTask>,
    pub members: Vec<String>,
    pub member_colors: HashMap<String, String>,
    pub member_ongoing: HashMap<String, bool>,
    pub deleted: bool,
}
