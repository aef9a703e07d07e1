use std::fs;
use std::path::{Path, PathBuf};

use tailtrace_runtime::{
    discover_subagents, discover_team_sessions, load_subagents, read_session,
};
use tailtrace_types::{Chunk, DisplayItem, SubagentItem};
use tempfile::TempDir;

fn write_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn user_line(uuid: &str, ts: &str, text: &str) -> String {
    format!(
        r#"{{"type":"user","uuid":"{uuid}","timestamp":"{ts}","message":{{"role":"user","content":"{text}"}}}}"#
    )
}

fn assistant_text(uuid: &str, ts: &str, text: &str) -> String {
    format!(
        r#"{{"type":"assistant","uuid":"{uuid}","timestamp":"{ts}","message":{{"role":"assistant","model":"claude-test-1","content":[{{"type":"text","text":"{text}"}}],"usage":{{"input_tokens":500,"output_tokens":20}}}}}}"#
    )
}

fn team_spawn_block(id: &str, name: &str, desc: &str) -> String {
    format!(
        r#"{{"type":"tool_use","id":"{id}","name":"Task","input":{{"team_name":"builders","name":"{name}","description":"{desc}","subagent_type":"general-purpose"}}}}"#
    )
}

fn spawn_result_line(uuid: &str, ts: &str, tool_id: &str, color: &str, agent_id: Option<&str>) -> String {
    let agent_field = match agent_id {
        Some(id) => format!(r#","agentId":"{id}""#),
        None => String::new(),
    };
    format!(
        r#"{{"type":"user","uuid":"{uuid}","timestamp":"{ts}","sourceToolUseID":"{tool_id}","toolUseResult":{{"status":"completed","color":"{color}"{agent_field}}},"message":{{"role":"user","content":[{{"type":"tool_result","tool_use_id":"{tool_id}","content":"agent finished"}}]}}}}"#
    )
}

fn teammate_opening(uuid: &str, ts: &str, summary: &str, color: &str) -> String {
    format!(
        r#"{{"type":"user","uuid":"{uuid}","timestamp":"{ts}","isSidechain":true,"message":{{"role":"user","content":"<teammate-message teammate_id=\"lead\" color=\"{color}\" summary=\"{summary}\">work on it</teammate-message>"}}}}"#
    )
}

fn write_subagent(parent: &Path, file: &str, lines: &[String]) -> PathBuf {
    let stem = parent.file_stem().unwrap().to_str().unwrap();
    let path = parent.parent().unwrap().join(stem).join("subagents").join(file);
    write_lines(&path, lines);
    path
}

fn subagent_items(chunks: &[Chunk]) -> Vec<&SubagentItem> {
    chunks
        .iter()
        .filter_map(|c| c.as_ai())
        .flat_map(|ai| ai.items.iter())
        .filter_map(|i| match i {
            DisplayItem::Subagent(sa) => Some(sa),
            _ => None,
        })
        .collect()
}

/// Three team spawns matched by summary (phase 2); a continuation file with
/// no summary stays unmatched; the colour map carries the parent's
/// toolUseResult colours.
#[test]
fn test_team_linking_end_to_end() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000100.jsonl");

    write_lines(
        &parent,
        &[
            user_line("u1", "2024-03-01T10:00:00Z", "Build the system"),
            format!(
                r#"{{"type":"assistant","uuid":"a1","timestamp":"2024-03-01T10:00:05Z","message":{{"role":"assistant","model":"claude-test-1","content":[{},{},{}]}}}}"#,
                team_spawn_block("s1", "alice", "Implement auth module"),
                team_spawn_block("s2", "bob", "Write integration tests"),
                team_spawn_block("s3", "carol", "Research API docs"),
            ),
            spawn_result_line("m1", "2024-03-01T10:10:00Z", "s1", "blue", None),
            spawn_result_line("m2", "2024-03-01T10:10:01Z", "s2", "green", None),
            spawn_result_line("m3", "2024-03-01T10:10:02Z", "s3", "red", None),
        ],
    );

    write_subagent(
        &parent,
        "agent-aaa111.jsonl",
        &[
            teammate_opening("c1", "2024-03-01T10:01:00Z", "Implement auth module", "blue"),
            assistant_text("ca1", "2024-03-01T10:01:30Z", "auth done"),
        ],
    );
    write_subagent(
        &parent,
        "agent-bbb222.jsonl",
        &[
            teammate_opening("c2", "2024-03-01T10:02:00Z", "Write integration tests", "green"),
            assistant_text("cb1", "2024-03-01T10:02:30Z", "tests done"),
        ],
    );
    write_subagent(
        &parent,
        "agent-ccc333.jsonl",
        &[
            teammate_opening("c3", "2024-03-01T10:03:00Z", "Research API docs", "red"),
            assistant_text("cc1", "2024-03-01T10:03:30Z", "docs read"),
        ],
    );
    // Continuation without a summary attribute.
    write_subagent(
        &parent,
        "agent-ddd444.jsonl",
        &[
            user_line("c4", "2024-03-01T10:04:00Z", "continue working"),
            assistant_text("cd1", "2024-03-01T10:04:30Z", "resuming"),
        ],
    );

    let mut chunks = read_session(&parent).unwrap();
    let (processes, colors) = load_subagents(&parent, &mut chunks).unwrap();

    assert_eq!(processes.len(), 4);
    // Sorted by start time.
    let ids: Vec<&str> = processes.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["aaa111", "bbb222", "ccc333", "ddd444"]);

    let by_id = |id: &str| processes.iter().find(|p| p.id == id).unwrap();
    assert_eq!(by_id("aaa111").parent_task_id.as_deref(), Some("s1"));
    assert_eq!(by_id("aaa111").description, "Implement auth module");
    assert_eq!(by_id("bbb222").parent_task_id.as_deref(), Some("s2"));
    assert_eq!(by_id("ccc333").parent_task_id.as_deref(), Some("s3"));
    assert!(by_id("ddd444").parent_task_id.is_none());

    assert_eq!(colors.get("s1").map(String::as_str), Some("blue"));
    assert_eq!(colors.get("s2").map(String::as_str), Some("green"));
    assert_eq!(colors.get("s3").map(String::as_str), Some("red"));

    let items = subagent_items(&chunks);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].agent_id.as_deref(), Some("aaa111"));
    assert_eq!(items[1].agent_id.as_deref(), Some("bbb222"));
    assert_eq!(items[2].agent_id.as_deref(), Some("ccc333"));

    // The child announced its own colour; the continuation has none and no
    // link to adopt one through.
    assert_eq!(by_id("aaa111").team_color.as_deref(), Some("blue"));
    assert!(by_id("ddd444").team_color.is_none());
}

/// Explicit agentId in toolUseResult wins (phase 1) and the process adopts
/// the spawn's colour when it has none of its own.
#[test]
fn test_agent_id_linking() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000101.jsonl");

    write_lines(
        &parent,
        &[
            user_line("u1", "2024-03-01T10:00:00Z", "explore"),
            format!(
                r#"{{"type":"assistant","uuid":"a1","timestamp":"2024-03-01T10:00:05Z","message":{{"role":"assistant","model":"m","content":[{{"type":"tool_use","id":"t1","name":"Task","input":{{"description":"explore codebase","subagent_type":"Explore","prompt":"look"}}}}]}}}}"#
            ),
            spawn_result_line("m1", "2024-03-01T10:05:00Z", "t1", "cyan", Some("abc123")),
        ],
    );
    write_subagent(
        &parent,
        "agent-abc123.jsonl",
        &[
            user_line("c1", "2024-03-01T10:00:10Z", "go"),
            assistant_text("ca1", "2024-03-01T10:04:00Z", "found things"),
        ],
    );

    let mut chunks = read_session(&parent).unwrap();
    let (processes, colors) = load_subagents(&parent, &mut chunks).unwrap();

    assert_eq!(processes.len(), 1);
    let proc = &processes[0];
    assert_eq!(proc.id, "abc123");
    assert_eq!(proc.parent_task_id.as_deref(), Some("t1"));
    assert_eq!(proc.description, "explore codebase");
    assert_eq!(proc.subagent_type, "Explore");
    assert_eq!(proc.team_color.as_deref(), Some("cyan"));
    assert_eq!(colors.get("t1").map(String::as_str), Some("cyan"));
    assert_eq!(proc.duration_ms, 230_000);
    assert_eq!(proc.usage.total(), 520);
}

/// Without agent ids or summaries, plain spawns pair positionally, 1-1 and
/// in order, with no wraparound.
#[test]
fn test_positional_fallback_linking() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000102.jsonl");

    write_lines(
        &parent,
        &[
            user_line("u1", "2024-03-01T10:00:00Z", "fan out"),
            format!(
                r#"{{"type":"assistant","uuid":"a1","timestamp":"2024-03-01T10:00:05Z","message":{{"role":"assistant","model":"m","content":[{{"type":"tool_use","id":"t1","name":"Task","input":{{"description":"first job"}}}},{{"type":"tool_use","id":"t2","name":"Task","input":{{"description":"second job"}}}},{{"type":"tool_use","id":"t3","name":"Task","input":{{"description":"third job"}}}}]}}}}"#
            ),
        ],
    );
    write_subagent(
        &parent,
        "agent-aaa.jsonl",
        &[
            user_line("c1", "2024-03-01T10:00:10Z", "go"),
            assistant_text("ca1", "2024-03-01T10:01:00Z", "done a"),
        ],
    );
    write_subagent(
        &parent,
        "agent-bbb.jsonl",
        &[
            user_line("c2", "2024-03-01T10:00:20Z", "go"),
            assistant_text("cb1", "2024-03-01T10:01:00Z", "done b"),
        ],
    );

    let mut chunks = read_session(&parent).unwrap();
    let (processes, _) = load_subagents(&parent, &mut chunks).unwrap();

    assert_eq!(processes.len(), 2);
    assert_eq!(processes[0].id, "aaa");
    assert_eq!(processes[0].parent_task_id.as_deref(), Some("t1"));
    assert_eq!(processes[1].id, "bbb");
    assert_eq!(processes[1].parent_task_id.as_deref(), Some("t2"));

    // The third spawn has no process to pair with.
    let items = subagent_items(&chunks);
    assert!(items[2].agent_id.is_none());
}

#[test]
fn test_discover_subagents_skips_warmup_compaction_and_empty() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000103.jsonl");
    write_lines(&parent, &[user_line("u1", "2024-03-01T10:00:00Z", "hi")]);

    write_subagent(
        &parent,
        "agent-real01.jsonl",
        &[
            user_line("c1", "2024-03-01T10:00:10Z", "go"),
            assistant_text("ca1", "2024-03-01T10:00:20Z", "ok"),
        ],
    );
    write_subagent(
        &parent,
        "agent-warm01.jsonl",
        &[user_line("w1", "2024-03-01T10:00:10Z", "Warmup")],
    );
    write_subagent(
        &parent,
        "agent-acompact01.jsonl",
        &[user_line("x1", "2024-03-01T10:00:10Z", "compacted history")],
    );
    let stem = parent.file_stem().unwrap().to_str().unwrap();
    let empty = dir.path().join(stem).join("subagents").join("agent-empty.jsonl");
    fs::write(&empty, "").unwrap();

    let processes = discover_subagents(&parent).unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].id, "real01");
}

#[test]
fn test_discover_team_sessions_matches_first_line_header() {
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000104.jsonl");
    write_lines(
        &parent,
        &[
            user_line("u1", "2024-03-01T10:00:00Z", "spin up ops"),
            format!(
                r#"{{"type":"assistant","uuid":"a1","timestamp":"2024-03-01T10:00:05Z","message":{{"role":"assistant","model":"m","content":[{{"type":"tool_use","id":"s1","name":"Task","input":{{"team_name":"ops","name":"dan","description":"Watch the deploy"}}}}]}}}}"#
            ),
        ],
    );

    // Matching member file: first line carries teamName/agentName.
    let member = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000105.jsonl");
    write_lines(
        &member,
        &[
            format!(
                r#"{{"type":"user","uuid":"w1","timestamp":"2024-03-01T10:01:00Z","teamName":"ops","agentName":"dan","message":{{"role":"user","content":"start watching"}}}}"#
            ),
            assistant_text("wa1", "2024-03-01T10:01:30Z", "watching"),
        ],
    );
    // Unrelated sibling: never spawned, so never parsed in.
    let other = dir.path().join("b2f6c9e8-3c89-4f2e-9d1a-000000000106.jsonl");
    write_lines(
        &other,
        &[format!(
            r#"{{"type":"user","uuid":"x1","timestamp":"2024-03-01T10:01:00Z","teamName":"ops","agentName":"someone-else","message":{{"role":"user","content":"hi"}}}}"#
        )],
    );

    let chunks = read_session(&parent).unwrap();
    let processes = discover_team_sessions(&parent, &chunks).unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].id, "dan@ops");
    assert_eq!(processes[0].agent_name.as_deref(), Some("dan"));
    assert_eq!(processes[0].team_name.as_deref(), Some("ops"));
}
