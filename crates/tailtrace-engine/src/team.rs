use serde_json::Value;
use tailtrace_types::{Chunk, DisplayItem, SubagentProcess, TeamSnapshot, TeamTask};

use crate::ongoing::is_ongoing;

/// Replay team-lifecycle tool calls across the lead and worker transcripts
/// to compute the final task boards.
///
/// Lead pass: `TeamCreate` opens a team (task ids restart at "1"),
/// `TaskCreate`/`TaskUpdate` edit the active board, `TeamDelete` closes it.
/// Worker pass: each `"<agent>@<team>"` process replays its own updates,
/// defaulting the owner to the worker itself.
pub fn reconstruct_teams(lead_chunks: &[Chunk], workers: &[SubagentProcess]) -> Vec<TeamSnapshot> {
    let mut teams: Vec<TeamSnapshot> = Vec::new();
    let mut active: Option<usize> = None;
    let mut task_counter: u64 = 0;

    for chunk in lead_chunks {
        let Some(ai) = chunk.as_ai() else { continue };
        for item in &ai.items {
            match item {
                DisplayItem::ToolCall(tc) => match tc.tool_name.as_str() {
                    "TeamCreate" => {
                        teams.push(TeamSnapshot {
                            name: str_key(&tc.tool_input, "team_name")
                                .or_else(|| str_key(&tc.tool_input, "name"))
                                .unwrap_or_default(),
                            description: str_key(&tc.tool_input, "description")
                                .unwrap_or_default(),
                            ..Default::default()
                        });
                        active = Some(teams.len() - 1);
                        task_counter = 0;
                    }
                    "TaskCreate" => {
                        if let Some(idx) = active {
                            task_counter += 1;
                            teams[idx].tasks.push(TeamTask {
                                id: task_counter.to_string(),
                                subject: str_key(&tc.tool_input, "subject").unwrap_or_default(),
                                status: "pending".to_string(),
                                owner: String::new(),
                            });
                        }
                    }
                    "TaskUpdate" => {
                        if let Some(idx) = active {
                            apply_task_update(&mut teams[idx], &tc.tool_input, None);
                        }
                    }
                    "TeamDelete" => {
                        if let Some(idx) = active.take() {
                            teams[idx].deleted = true;
                        }
                    }
                    _ => {}
                },
                DisplayItem::Subagent(sa) => {
                    if let Some((team_name, member)) = sa.team_pair()
                        && let Some(team) = teams.iter_mut().find(|t| t.name == team_name)
                        && !team.members.contains(&member)
                    {
                        team.members.push(member);
                    }
                }
                _ => {}
            }
        }
    }

    for worker in workers {
        let Some((agent, team_name)) = worker.id.split_once('@') else {
            continue;
        };
        let Some(team) = teams.iter_mut().find(|t| t.name == team_name) else {
            continue;
        };

        for chunk in &worker.chunks {
            let Some(ai) = chunk.as_ai() else { continue };
            for item in &ai.items {
                if let DisplayItem::ToolCall(tc) = item
                    && tc.tool_name == "TaskUpdate"
                {
                    apply_task_update(team, &tc.tool_input, Some(agent));
                }
            }
        }

        if let Some(color) = &worker.team_color {
            team.member_colors.insert(agent.to_string(), color.clone());
        }
        team.member_ongoing
            .insert(agent.to_string(), is_ongoing(&worker.chunks));
    }

    teams
}

fn apply_task_update(team: &mut TeamSnapshot, input: &Value, default_owner: Option<&str>) {
    let Some(task_id) = str_key(input, "taskId").or_else(|| str_key(input, "task_id")) else {
        return;
    };
    let Some(task) = team.tasks.iter_mut().find(|t| t.id == task_id) else {
        return;
    };
    if let Some(status) = str_key(input, "status") {
        task.status = status;
    }
    match str_key(input, "owner") {
        Some(owner) => task.owner = owner,
        None => {
            if let Some(default) = default_owner {
                task.owner = default.to_string();
            }
        }
    }
    if let Some(subject) = str_key(input, "subject") {
        task.subject = subject;
    }
}

fn str_key(input: &Value, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}
