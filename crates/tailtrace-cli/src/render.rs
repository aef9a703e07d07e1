use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use tailtrace_parser::summarize_tool_input;
use tailtrace_types::{Chunk, DisplayItem, SubagentProcess, TeamSnapshot, truncate_chars};

const PREVIEW_CHARS: usize = 200;

/// Plain console renderer for chunk streams.
pub struct Renderer {
    expand: bool,
    color: bool,
}

impl Renderer {
    pub fn new(expand: bool) -> Self {
        Self {
            expand,
            color: std::io::stdout().is_terminal(),
        }
    }

    pub fn render_chunks(&self, chunks: &[Chunk]) {
        for chunk in chunks {
            match chunk {
                Chunk::User(u) => {
                    let mut label = "❯ user".to_string();
                    if let Some(mode) = &u.permission_mode {
                        label.push_str(&format!(" [{mode}]"));
                    }
                    println!("{}", self.bold_cyan(&label));
                    println!("{}", self.body(&u.text));
                }
                Chunk::Ai(ai) => {
                    let mut label = format!("● {}", ai.model);
                    if ai.duration_ms > 0 {
                        label.push_str(&format!(" ({})", fmt_duration(ai.duration_ms)));
                    }
                    if ai.usage.total() > 0 {
                        label.push_str(&format!(" · {} tokens", ai.usage.total()));
                    }
                    println!("{}", self.bold_green(&label));
                    for item in &ai.items {
                        self.render_item(item);
                    }
                }
                Chunk::System(s) => {
                    let label = if s.is_error { "✦ output (error)" } else { "✦ output" };
                    if s.is_error {
                        println!("{}", self.red(label));
                    } else {
                        println!("{}", self.dim(label));
                    }
                    println!("{}", self.body(&s.output));
                }
                Chunk::Compact(c) => {
                    println!("{}", self.dim(&format!("── compacted: {} ──", c.text)));
                }
            }
            println!();
        }
    }

    fn render_item(&self, item: &DisplayItem) {
        match item {
            DisplayItem::Thinking(t) => {
                println!(
                    "  {}",
                    self.dim(&format!("∴ thinking ({} tokens)", t.token_count))
                );
                if self.expand && !t.text.is_empty() {
                    println!("{}", indent(&self.body(&t.text)));
                }
            }
            DisplayItem::Output(o) => {
                println!("{}", indent(&self.body(&o.text)));
            }
            DisplayItem::ToolCall(tc) => {
                let mut line = format!("⚙ {}", summarize_tool_input(&tc.tool_name, &tc.tool_input));
                if tc.duration_ms > 0 {
                    line.push_str(&format!(" ({})", fmt_duration(tc.duration_ms)));
                }
                if tc.tool_error {
                    println!("  {}", self.red(&line));
                } else {
                    println!("  {}", self.yellow(&line));
                }
                if !tc.tool_result.is_empty() {
                    println!("{}", indent(&self.dim(&self.preview(&tc.tool_result))));
                }
            }
            DisplayItem::Subagent(sa) => {
                let mut line = format!("⇒ {} {}", sa.tool_name, sa.subagent_desc);
                if !sa.subagent_type.is_empty() {
                    line.push_str(&format!(" [{}]", sa.subagent_type));
                }
                if let Some(agent_id) = &sa.agent_id {
                    line.push_str(&format!(" (agent {agent_id})"));
                }
                if sa.duration_ms > 0 {
                    line.push_str(&format!(" ({})", fmt_duration(sa.duration_ms)));
                }
                println!("  {}", self.magenta(&line));
                if !sa.tool_result.is_empty() {
                    println!("{}", indent(&self.dim(&self.preview(&sa.tool_result))));
                }
            }
            DisplayItem::TeammateMessage(tm) => {
                println!(
                    "  {}",
                    self.bold_cyan(&format!("✉ {}: {}", tm.teammate_id, self.preview(&tm.text)))
                );
            }
        }
    }

    pub fn render_subagents(&self, processes: &[SubagentProcess]) {
        if processes.is_empty() {
            return;
        }
        println!("{}", self.bold_green("Sub-agents"));
        for proc in processes {
            let mut line = format!("  {} ", proc.id);
            if !proc.description.is_empty() {
                line.push_str(&proc.description);
            }
            if proc.duration_ms > 0 {
                line.push_str(&format!(" ({})", fmt_duration(proc.duration_ms)));
            }
            if proc.usage.total() > 0 {
                line.push_str(&format!(" · {} tokens", proc.usage.total()));
            }
            if proc.parent_task_id.is_none() {
                line.push_str(" · unlinked");
            }
            println!("{}", self.dim(&line));
        }
        println!();
    }

    pub fn render_teams(&self, teams: &[TeamSnapshot]) {
        for team in teams {
            let mut header = format!("Team {}", team.name);
            if team.deleted {
                header.push_str(" (deleted)");
            }
            println!("{}", self.bold_green(&header));
            if !team.description.is_empty() {
                println!("  {}", self.dim(&team.description));
            }
            for task in &team.tasks {
                let mut line = format!("  #{} [{}] {}", task.id, task.status, task.subject);
                if !task.owner.is_empty() {
                    line.push_str(&format!(" @{}", task.owner));
                }
                println!("{}", self.body(&line));
            }
            for member in &team.members {
                let ongoing = team.member_ongoing.get(member).copied().unwrap_or(false);
                let state = if ongoing { "working" } else { "idle" };
                println!("  {}", self.dim(&format!("✉ {member} ({state})")));
            }
            println!();
        }
    }

    fn preview(&self, text: &str) -> String {
        if self.expand {
            text.to_string()
        } else {
            truncate_chars(text.trim_end(), PREVIEW_CHARS)
        }
    }

    fn body(&self, text: &str) -> String {
        self.preview(text)
    }

    fn bold_cyan(&self, s: &str) -> String {
        if self.color {
            s.cyan().bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn bold_green(&self, s: &str) -> String {
        if self.color {
            s.green().bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn yellow(&self, s: &str) -> String {
        if self.color {
            s.yellow().to_string()
        } else {
            s.to_string()
        }
    }

    fn magenta(&self, s: &str) -> String {
        if self.color {
            s.magenta().to_string()
        } else {
            s.to_string()
        }
    }

    fn red(&self, s: &str) -> String {
        if self.color {
            s.red().to_string()
        } else {
            s.to_string()
        }
    }

    fn dim(&self, s: &str) -> String {
        if self.color {
            s.dimmed().to_string()
        } else {
            s.to_string()
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fmt_duration(ms: i64) -> String {
    let secs = ms / 1000;
    if secs < 1 {
        format!("{}ms", ms)
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_duration() {
        assert_eq!(fmt_duration(500), "500ms");
        assert_eq!(fmt_duration(30_000), "30s");
        assert_eq!(fmt_duration(660_000), "11m0s");
        assert_eq!(fmt_duration(7_260_000), "2h1m");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb"), "    a\n    b");
    }
}
