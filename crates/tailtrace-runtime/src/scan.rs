use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tailtrace_engine::{build_chunks, is_ongoing};
use tailtrace_parser::{LineReader, classify, extract_text, parse_entry, zero_time};
use tailtrace_types::{ClassifiedMsg, SessionInfo, collapse_whitespace, truncate_chars};

use crate::error::Result;

/// Sessions untouched for this long are never reported as ongoing,
/// whatever their activity sequence says.
const STALE_AFTER: Duration = Duration::from_secs(5 * 60);

const FIRST_MSG_CHARS: usize = 120;

/// Stream a session once to build its picker metadata.
///
/// `None` means a ghost: no user message of any kind ever appeared, and the
/// file must not surface in listings.
pub fn scan_session(path: &Path) -> Result<Option<SessionInfo>> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata.modified()?;

    let file = File::open(path)?;
    let mut reader = LineReader::new(BufReader::new(file));

    let mut msgs: Vec<ClassifiedMsg> = Vec::new();
    let mut first_msg: Option<String> = None;
    let mut slash_fallback: Option<String> = None;
    let mut turn_count = 0usize;
    let mut pending_user = false;
    let mut total_tokens = 0u64;
    let mut first_ts = None;
    let mut last_ts = None;
    let mut model: Option<String> = None;
    let mut saw_user = false;

    while let Some(line) = reader.next_line() {
        let Some(entry) = parse_entry(&line) else {
            continue;
        };

        if entry.timestamp != zero_time() {
            if first_ts.is_none() {
                first_ts = Some(entry.timestamp);
            }
            last_ts = Some(entry.timestamp);
        }

        if entry.kind == "assistant" && !entry.is_sidechain && entry.model != "<synthetic>" {
            total_tokens += entry.usage.total();
            if model.is_none() && !entry.model.is_empty() {
                model = Some(entry.model.clone());
            }
        }

        let raw = extract_text(&entry.content);
        let lead = raw.trim_start();
        let is_command =
            lead.starts_with("<command-name>") || lead.starts_with("<command-message>");

        let Some(msg) = classify(&entry) else {
            continue;
        };
        match &msg {
            ClassifiedMsg::User(u) => {
                saw_user = true;
                if is_command {
                    if slash_fallback.is_none() {
                        slash_fallback = Some(u.text.clone());
                    }
                } else if first_msg.is_none() {
                    first_msg = Some(u.text.clone());
                }
                if pending_user {
                    turn_count += 1;
                }
                pending_user = true;
            }
            ClassifiedMsg::Ai(ai) if !ai.is_meta => {
                if pending_user {
                    turn_count += 1;
                    pending_user = false;
                }
            }
            _ => {}
        }
        msgs.push(msg);
    }
    if let Some(err) = reader.take_io_error() {
        return Err(err.into());
    }
    if pending_user {
        turn_count += 1;
    }

    if !saw_user {
        return Ok(None);
    }

    let first_msg = first_msg
        .or(slash_fallback)
        .map(|s| truncate_chars(&collapse_whitespace(&s), FIRST_MSG_CHARS))
        .unwrap_or_default();

    let duration_ms = match (first_ts, last_ts) {
        (Some(first), Some(last)) => (last - first).num_milliseconds(),
        _ => 0,
    };

    let fresh = SystemTime::now()
        .duration_since(mtime)
        .map(|age| age < STALE_AFTER)
        .unwrap_or(true);
    let chunks = build_chunks(&msgs);
    let ongoing = fresh && is_ongoing(&chunks);

    let session_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();

    Ok(Some(SessionInfo {
        path: path.to_path_buf(),
        session_id,
        mtime,
        first_msg,
        turn_count,
        total_tokens,
        duration_ms,
        model: model.unwrap_or_default(),
        is_ongoing: ongoing,
    }))
}
