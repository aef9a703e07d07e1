mod cache;
mod error;
mod reader;
mod scan;
mod subagents;
mod watcher;

pub use cache::discover_project_sessions;
pub use error::{Error, Result};
pub use reader::{SubagentRead, read_session, read_session_incremental, read_subagent_session};
pub use scan::scan_session;
pub use subagents::{discover_subagents, discover_team_sessions, link_subagents, load_subagents};
pub use watcher::{SessionWatcher, WatchUpdate};
