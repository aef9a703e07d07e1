use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use tailtrace_engine::build_chunks;
use tailtrace_parser::{LineReader, classify, extract_text, parse_entry, teammate_attrs};
use tailtrace_types::{Chunk, ClassifiedMsg};

use crate::error::Result;

/// Read a whole session file into timeline chunks.
///
/// Corrupt and empty lines are skipped; only file-level I/O failures
/// surface as errors.
pub fn read_session(path: &Path) -> Result<Vec<Chunk>> {
    let (msgs, _) = read_classified(path, 0)?;
    Ok(build_chunks(&msgs))
}

/// Resume reading at a byte offset, returning only newly classified
/// messages and the offset to resume from next time.
///
/// Callers accumulate messages across calls and rebuild chunks over the
/// whole list; this is the hand-off point for the live watcher.
pub fn read_session_incremental(path: &Path, offset: u64) -> Result<(Vec<ClassifiedMsg>, u64)> {
    read_classified(path, offset)
}

fn read_classified(path: &Path, offset: u64) -> Result<(Vec<ClassifiedMsg>, u64)> {
    let mut file = File::open(path)?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
    }
    let mut reader = LineReader::new(BufReader::new(file));

    let mut msgs = Vec::new();
    while let Some(line) = reader.next_line() {
        let Some(entry) = parse_entry(&line) else {
            continue;
        };
        if let Some(msg) = classify(&entry) {
            msgs.push(msg);
        }
    }
    if let Some(err) = reader.take_io_error() {
        return Err(err.into());
    }
    Ok((msgs, offset + reader.bytes_read()))
}

/// A child session parsed from its own point of view.
#[derive(Debug, Clone)]
pub struct SubagentRead {
    pub chunks: Vec<Chunk>,
    /// `summary` attribute of the opening teammate-message wrapper, if any.
    pub summary: Option<String>,
    /// `color` attribute of the opening teammate-message wrapper, if any.
    pub color: Option<String>,
}

/// Read a sub-agent file. Child files are entirely side-chain from the
/// parent's viewpoint but are the main conversation from their own, so the
/// sidechain flag is cleared before classification. The teammate summary
/// and colour are pulled from the first user entry's raw content here,
/// before sanitisation destroys them.
pub fn read_subagent_session(path: &Path) -> Result<SubagentRead> {
    let file = File::open(path)?;
    let mut reader = LineReader::new(BufReader::new(file));

    let mut msgs = Vec::new();
    let mut summary = None;
    let mut color = None;
    let mut saw_user = false;

    while let Some(line) = reader.next_line() {
        let Some(mut entry) = parse_entry(&line) else {
            continue;
        };
        if !saw_user && entry.kind == "user" {
            saw_user = true;
            let raw = extract_text(&entry.content);
            if let Some(attrs) = teammate_attrs(raw.trim()) {
                summary = attrs.summary;
                if !attrs.color.is_empty() {
                    color = Some(attrs.color);
                }
            }
        }
        entry.is_sidechain = false;
        if let Some(msg) = classify(&entry) {
            msgs.push(msg);
        }
    }
    if let Some(err) = reader.take_io_error() {
        return Err(err.into());
    }

    Ok(SubagentRead {
        chunks: build_chunks(&msgs),
        summary,
        color,
    })
}
