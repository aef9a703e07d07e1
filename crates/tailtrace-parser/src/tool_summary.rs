use serde_json::Value;
use tailtrace_types::truncate_chars;

/// One-line summary of a tool invocation for timeline display.
///
/// Pure helper over the raw `tool_input`; unknown tools fall back to a
/// compact preview of the serialized input.
pub fn summarize_tool_input(tool_name: &str, input: &Value) -> String {
    match tool_name {
        "Bash" | "BashOutput" => {
            let cmd = str_field(input, "command")
                .or_else(|| str_field(input, "description"))
                .unwrap_or_default();
            format!("{} '{}'", tool_name, truncate_chars(&cmd, 60))
        }
        "Read" | "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => {
            let path = str_field(input, "file_path")
                .or_else(|| str_field(input, "notebook_path"))
                .unwrap_or_default();
            format!("{} {}", tool_name, truncate_path(&path, 48))
        }
        "Glob" | "Grep" => {
            let pattern = str_field(input, "pattern").unwrap_or_default();
            match str_field(input, "path") {
                Some(path) => format!(
                    "{} '{}' in {}",
                    tool_name,
                    truncate_chars(&pattern, 40),
                    truncate_path(&path, 32)
                ),
                None => format!("{} '{}'", tool_name, truncate_chars(&pattern, 40)),
            }
        }
        "WebFetch" => {
            let url = str_field(input, "url").unwrap_or_default();
            format!("{} {}", tool_name, truncate_chars(&url, 60))
        }
        "WebSearch" => {
            let query = str_field(input, "query").unwrap_or_default();
            format!("{} '{}'", tool_name, truncate_chars(&query, 60))
        }
        "Task" | "Agent" => {
            let desc = str_field(input, "description")
                .or_else(|| str_field(input, "prompt"))
                .unwrap_or_default();
            format!("{} {}", tool_name, truncate_chars(&desc, 60))
        }
        "SendMessage" => {
            let to = str_field(input, "to").unwrap_or_default();
            let summary = str_field(input, "summary").unwrap_or_default();
            if summary.is_empty() {
                format!("{} → {}", tool_name, to)
            } else {
                format!("{} → {}: {}", tool_name, to, truncate_chars(&summary, 48))
            }
        }
        _ => {
            let preview = serde_json::to_string(input).unwrap_or_default();
            format!("{} {}", tool_name, truncate_chars(&preview, 48))
        }
    }
}

fn str_field(input: &Value, key: &str) -> Option<String> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Truncate a file path, keeping the filename visible.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    if let Some(filename) = path.rsplit('/').next()
        && filename.chars().count() < max_len.saturating_sub(4)
    {
        return format!(".../{filename}");
    }
    truncate_chars(path, max_len)
}
