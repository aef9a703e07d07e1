use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tailtrace_parser::{LineReader, extract_text, parse_entry, zero_time};
use tailtrace_types::{Chunk, DisplayItem, SubagentItem, SubagentProcess};
use walkdir::WalkDir;

use crate::error::Result;
use crate::reader::{SubagentRead, read_subagent_session};

/// Compaction continuation files; they restate an earlier agent, never a
/// new spawn.
const COMPACT_ID_PREFIX: &str = "acompact";

/// Discovery path A: scan `<parent_dir>/<parent_stem>/subagents/` for
/// `agent-<id>.jsonl` files. Results are sorted by start time; ties keep
/// discovery order.
pub fn discover_subagents(parent_path: &Path) -> Result<Vec<SubagentProcess>> {
    let Some(stem) = parent_path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(Vec::new());
    };
    let dir = parent_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(stem)
        .join("subagents");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut processes = Vec::new();
    for entry in WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|e| e != "jsonl") {
            continue;
        }
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("agent-"))
        else {
            continue;
        };
        if id.starts_with(COMPACT_ID_PREFIX) {
            continue;
        }
        if entry.metadata().map(|m| m.len() == 0).unwrap_or(true) {
            continue;
        }
        if first_user_text(path).as_deref() == Some("Warmup") {
            continue;
        }

        match read_subagent_session(path) {
            Ok(read) => processes.push(build_process(id.to_string(), path.to_path_buf(), read)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable agent file, skipping");
            }
        }
    }

    processes.sort_by_key(|p| p.start_time);
    Ok(processes)
}

/// Discovery path B: team member files are sibling `.jsonl` files whose
/// first line carries top-level `teamName`/`agentName` matching a pair the
/// parent actually spawned.
pub fn discover_team_sessions(
    parent_path: &Path,
    parent_chunks: &[Chunk],
) -> Result<Vec<SubagentProcess>> {
    let spawned: HashSet<(String, String)> = subagent_items(parent_chunks)
        .filter_map(|item| item.team_pair())
        .collect();
    if spawned.is_empty() {
        return Ok(Vec::new());
    }

    let Some(dir) = parent_path.parent() else {
        return Ok(Vec::new());
    };

    let mut processes = Vec::new();
    for entry in WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path == parent_path || path.extension().is_none_or(|e| e != "jsonl")
        {
            continue;
        }
        if path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_none_or(|s| s.starts_with("agent-") || s.starts_with("agent_"))
        {
            continue;
        }
        let Some((team, agent)) = probe_team_header(path) else {
            continue;
        };
        if !spawned.contains(&(team.clone(), agent.clone())) {
            continue;
        }

        match read_subagent_session(path) {
            Ok(read) => {
                let mut proc =
                    build_process(format!("{agent}@{team}"), path.to_path_buf(), read);
                proc.agent_name = Some(agent);
                proc.team_name = Some(team);
                processes.push(proc);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable team file, skipping");
            }
        }
    }

    processes.sort_by_key(|p| p.start_time);
    Ok(processes)
}

/// Discover both sweeps, merge, and link against the parent's chunks.
pub fn load_subagents(
    parent_path: &Path,
    chunks: &mut [Chunk],
) -> Result<(Vec<SubagentProcess>, HashMap<String, String>)> {
    let mut processes = discover_subagents(parent_path)?;
    processes.extend(discover_team_sessions(parent_path, chunks)?);
    processes.sort_by_key(|p| p.start_time);
    let colors = link_subagents(&mut processes, chunks, parent_path)?;
    Ok((processes, colors))
}

/// Correlate discovered processes with the parent's `Subagent` items.
///
/// Three phases, each best-effort: explicit agent-id links from
/// `toolUseResult` metadata, then team-summary equality, then a positional
/// 1-1 fallback for plain sub-agents. Returns the tool-use id to colour
/// map so items without a linked process can still inherit a colour.
pub fn link_subagents(
    processes: &mut [SubagentProcess],
    chunks: &mut [Chunk],
    parent_path: &Path,
) -> Result<HashMap<String, String>> {
    let (agent_links, color_map) = scan_parent_links(parent_path)?;
    let locs = subagent_item_locs(chunks);
    let mut linked_tools: HashSet<String> = HashSet::new();

    // Phase 1: agent-id link.
    for proc in processes.iter_mut() {
        let Some(tool_id) = agent_links.get(&proc.id) else {
            continue;
        };
        let Some(loc) = locs
            .iter()
            .copied()
            .find(|&l| subagent_at(chunks, l).tool_id == *tool_id)
        else {
            continue;
        };
        enrich(proc, subagent_at_mut(chunks, loc));
        linked_tools.insert(tool_id.clone());
    }

    // Phase 2: team-summary match. Processes are sorted by start time, so
    // the first unmatched hit is the earliest-starting one.
    for &loc in &locs {
        let (tool_id, desc, is_team) = {
            let item = subagent_at(chunks, loc);
            (
                item.tool_id.clone(),
                item.subagent_desc.clone(),
                item.is_team(),
            )
        };
        if !is_team || linked_tools.contains(&tool_id) {
            continue;
        }
        if let Some(proc) = processes
            .iter_mut()
            .find(|p| !p.is_linked() && p.team_summary.as_deref() == Some(desc.as_str()))
        {
            enrich(proc, subagent_at_mut(chunks, loc));
            linked_tools.insert(tool_id);
        }
    }

    // Phase 3: positional fallback, no wraparound.
    let free_locs: Vec<(usize, usize)> = locs
        .iter()
        .copied()
        .filter(|&l| {
            let item = subagent_at(chunks, l);
            !item.is_team() && !linked_tools.contains(&item.tool_id)
        })
        .collect();
    let mut free_procs = processes
        .iter_mut()
        .filter(|p| !p.is_linked() && p.team_name.is_none() && p.team_summary.is_none());
    for loc in free_locs {
        let Some(proc) = free_procs.next() else {
            break;
        };
        enrich(proc, subagent_at_mut(chunks, loc));
    }

    for proc in processes.iter_mut() {
        if proc.team_color.is_none()
            && let Some(tool_id) = &proc.parent_task_id
            && let Some(color) = color_map.get(tool_id)
        {
            proc.team_color = Some(color.clone());
        }
    }

    Ok(color_map)
}

fn enrich(proc: &mut SubagentProcess, item: &mut SubagentItem) {
    proc.parent_task_id = Some(item.tool_id.clone());
    proc.description = item.subagent_desc.clone();
    proc.subagent_type = item.subagent_type.clone();
    item.agent_id = Some(proc.id.clone());
}

/// One pass over the parent file for the two phase-1 maps:
/// `agent_id -> tool_use_id` and `tool_use_id -> colour`.
fn scan_parent_links(
    parent_path: &Path,
) -> Result<(HashMap<String, String>, HashMap<String, String>)> {
    let file = File::open(parent_path)?;
    let mut reader = LineReader::new(BufReader::new(file));

    let mut agent_links = HashMap::new();
    let mut colors = HashMap::new();

    while let Some(line) = reader.next_line() {
        let Some(entry) = parse_entry(&line) else {
            continue;
        };
        let Some(obj) = entry.tool_use_result_object() else {
            continue;
        };
        let tool_id = if !entry.source_tool_use_id.is_empty() {
            Some(entry.source_tool_use_id.clone())
        } else {
            first_tool_result_id(&entry.content)
        };
        let Some(tool_id) = tool_id else {
            continue;
        };

        if let Some(agent_id) = obj
            .get("agentId")
            .or_else(|| obj.get("agent_id"))
            .and_then(|v| v.as_str())
        {
            agent_links.insert(agent_id.to_string(), tool_id.clone());
        }
        if let Some(color) = obj.get("color").and_then(|v| v.as_str()) {
            colors.insert(tool_id, color.to_string());
        }
    }
    if let Some(err) = reader.take_io_error() {
        return Err(err.into());
    }

    Ok((agent_links, colors))
}

fn first_tool_result_id(content: &Value) -> Option<String> {
    content
        .as_array()?
        .iter()
        .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_result"))?
        .get("tool_use_id")?
        .as_str()
        .map(String::from)
}

fn first_user_text(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut reader = LineReader::new(BufReader::new(file));
    while let Some(line) = reader.next_line() {
        if let Some(entry) = parse_entry(&line)
            && entry.kind == "user"
        {
            return Some(extract_text(&entry.content));
        }
    }
    None
}

/// Cheap probe: only the first line is read.
fn probe_team_header(path: &Path) -> Option<(String, String)> {
    let file = File::open(path).ok()?;
    let mut reader = LineReader::new(BufReader::new(file));
    let line = reader.next_line()?;
    let value: Value = serde_json::from_str(&line).ok()?;
    let team = value.get("teamName")?.as_str()?;
    let agent = value.get("agentName")?.as_str()?;
    if team.is_empty() || agent.is_empty() {
        return None;
    }
    Some((team.to_string(), agent.to_string()))
}

fn build_process(id: String, path: PathBuf, read: SubagentRead) -> SubagentProcess {
    let start_time = read
        .chunks
        .iter()
        .map(|c| c.timestamp())
        .find(|t| *t != zero_time())
        .unwrap_or_else(zero_time);
    let end_time = read
        .chunks
        .iter()
        .rev()
        .map(|c| c.timestamp())
        .find(|t| *t != zero_time())
        .unwrap_or_else(zero_time);
    let duration_ms = if start_time != zero_time() && end_time != zero_time() {
        (end_time - start_time).num_milliseconds()
    } else {
        0
    };
    let usage = read
        .chunks
        .iter()
        .rev()
        .find_map(|c| c.as_ai())
        .map(|ai| ai.usage)
        .unwrap_or_default();

    SubagentProcess {
        id,
        path,
        chunks: read.chunks,
        start_time,
        end_time,
        duration_ms,
        usage,
        parent_task_id: None,
        description: String::new(),
        subagent_type: String::new(),
        team_summary: read.summary,
        team_color: read.color,
        agent_name: None,
        team_name: None,
    }
}

fn subagent_items(chunks: &[Chunk]) -> impl Iterator<Item = &SubagentItem> {
    chunks
        .iter()
        .filter_map(|c| c.as_ai())
        .flat_map(|ai| ai.items.iter())
        .filter_map(|item| match item {
            DisplayItem::Subagent(sa) => Some(sa),
            _ => None,
        })
}

fn subagent_item_locs(chunks: &[Chunk]) -> Vec<(usize, usize)> {
    let mut locs = Vec::new();
    for (ci, chunk) in chunks.iter().enumerate() {
        if let Some(ai) = chunk.as_ai() {
            for (ii, item) in ai.items.iter().enumerate() {
                if matches!(item, DisplayItem::Subagent(_)) {
                    locs.push((ci, ii));
                }
            }
        }
    }
    locs
}

fn subagent_at(chunks: &[Chunk], loc: (usize, usize)) -> &SubagentItem {
    match &chunks[loc.0] {
        Chunk::Ai(ai) => match &ai.items[loc.1] {
            DisplayItem::Subagent(sa) => sa,
            _ => unreachable!("location built from a Subagent item"),
        },
        _ => unreachable!("location built from an AI chunk"),
    }
}

fn subagent_at_mut(chunks: &mut [Chunk], loc: (usize, usize)) -> &mut SubagentItem {
    match &mut chunks[loc.0] {
        Chunk::Ai(ai) => match &mut ai.items[loc.1] {
            DisplayItem::Subagent(sa) => sa,
            _ => unreachable!("location built from a Subagent item"),
        },
        _ => unreachable!("location built from an AI chunk"),
    }
}
