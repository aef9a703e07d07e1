use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use once_cell::sync::Lazy;
use tailtrace_types::SessionInfo;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::Result;
use crate::scan::scan_session;

#[derive(Clone)]
struct CachedScan {
    mtime: SystemTime,
    /// `None` records a ghost, so it is not rescanned every sweep.
    info: Option<SessionInfo>,
}

/// Process-wide scan memo keyed by path. Values are replaced whole on
/// rescan, never mutated in place.
static SCAN_CACHE: Lazy<Mutex<HashMap<PathBuf, CachedScan>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// List a project directory's sessions for the picker, newest first.
///
/// Side-child agent files and ghost sessions are excluded; unchanged files
/// come from the cache, everything else is rescanned.
pub fn discover_project_sessions(dir: &Path) -> Result<Vec<SessionInfo>> {
    let mut sessions = Vec::new();

    for entry in WalkDir::new(dir).max_depth(1).into_iter() {
        let entry = entry?;
        let path = entry.path();
        if !is_session_file(path) {
            continue;
        }
        let mtime = match path.metadata().and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable session file, skipping");
                continue;
            }
        };

        if let Some(cached) = lookup(path, mtime) {
            if let Some(info) = cached {
                sessions.push(info);
            }
            continue;
        }

        match scan_session(path) {
            Ok(info) => {
                store(path, mtime, info.clone());
                if let Some(info) = info {
                    sessions.push(info);
                } else {
                    tracing::debug!(path = %path.display(), "ghost session, excluded");
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "session scan failed, skipping");
            }
        }
    }

    sessions.sort_by(|a, b| b.mtime.cmp(&a.mtime));
    Ok(sessions)
}

fn lookup(path: &Path, mtime: SystemTime) -> Option<Option<SessionInfo>> {
    let cache = SCAN_CACHE.lock().expect("scan cache poisoned");
    cache
        .get(path)
        .filter(|c| c.mtime == mtime)
        .map(|c| c.info.clone())
}

fn store(path: &Path, mtime: SystemTime, info: Option<SessionInfo>) {
    let mut cache = SCAN_CACHE.lock().expect("scan cache poisoned");
    cache.insert(path.to_path_buf(), CachedScan { mtime, info });
}

/// Session files are `<uuid>.jsonl` directly in the project directory.
/// Agent side-files (`agent-*`, `agent_*`, anything under `subagents/`)
/// belong to their parent session, not the picker.
fn is_session_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if path.extension().is_none_or(|e| e != "jsonl") {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    if stem.starts_with("agent-") || stem.starts_with("agent_") {
        return false;
    }
    if path
        .parent()
        .and_then(|p| p.file_name())
        .is_some_and(|n| n == "subagents")
    {
        return false;
    }
    Uuid::parse_str(stem).is_ok()
}
