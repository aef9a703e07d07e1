use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub(crate) const EMPTY_STDOUT: &str = "<local-command-stdout></local-command-stdout>";
pub(crate) const EMPTY_STDERR: &str = "<local-command-stderr></local-command-stderr>";

static CAVEAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<local-command-caveat>.*?</local-command-caveat>").unwrap());
static REMINDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<system-reminder>.*?</system-reminder>").unwrap());
static COMMAND_WRAPPER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<command-name>.*?</command-name>|<command-message>.*?</command-message>|<command-args>.*?</command-args>",
    )
    .unwrap()
});
static BASH_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<bash-input>(.*?)</bash-input>").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([\w-]+)="([^"]*)""#).unwrap());

/// Extract plain text from string-or-array message content.
///
/// Array content concatenates the `text` fields of text-typed blocks with
/// newline separators.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect();
            parts.join("\n")
        }
        _ => String::new(),
    }
}

fn inner_between<'a>(s: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = s.find(open)? + open.len();
    let end = s[start..].find(close)? + start;
    Some(&s[start..end])
}

/// Split an attribute-bearing tag into (attribute string, body). The body
/// runs to the closing tag, or to the end of input for unterminated writes.
fn attr_tag_parts<'a>(s: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let open = format!("<{tag}");
    let start = s.find(&open)?;
    let after = &s[start + open.len()..];
    let gt = after.find('>')?;
    let attrs = &after[..gt];
    let rest = &after[gt + 1..];
    let close = format!("</{tag}>");
    let end = rest.find(&close).unwrap_or(rest.len());
    Some((attrs, &rest[..end]))
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(attrs)
        .find(|c| &c[1] == name)
        .map(|c| c[2].to_string())
}

/// True when the content is nothing but a hard-noise wrapper.
pub fn is_hard_noise(s: &str) -> bool {
    let t = s.trim();
    (t.starts_with("<local-command-caveat>") && t.ends_with("</local-command-caveat>"))
        || (t.starts_with("<system-reminder>") && t.ends_with("</system-reminder>"))
}

/// Inner body of the first stdout or stderr wrapper, trimmed.
pub fn extract_command_output(s: &str) -> Option<String> {
    inner_between(s, "<local-command-stdout>", "</local-command-stdout>")
        .or_else(|| inner_between(s, "<local-command-stderr>", "</local-command-stderr>"))
        .map(|inner| inner.trim().to_string())
}

/// Command or background-task output extracted from a wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub text: String,
    pub is_error: bool,
}

/// Output of a slash command, when the content starts with a
/// local-command-stdout/stderr wrapper.
pub fn local_command_output(s: &str) -> Option<CommandOutput> {
    let t = s.trim_start();
    if !t.starts_with("<local-command-stdout") && !t.starts_with("<local-command-stderr") {
        return None;
    }
    let stdout = inner_between(t, "<local-command-stdout>", "</local-command-stdout>")
        .map(str::trim)
        .unwrap_or("");
    let stderr = inner_between(t, "<local-command-stderr>", "</local-command-stderr>")
        .map(str::trim)
        .unwrap_or("");

    let mut text = stdout.to_string();
    if !stderr.is_empty() {
        if text.is_empty() {
            text = stderr.to_string();
        } else {
            text.push('\n');
            text.push_str(stderr);
        }
    }
    Some(CommandOutput {
        text,
        is_error: !stderr.is_empty(),
    })
}

/// Output of a bash-mode command (`<bash-stdout>`/`<bash-stderr>` wrappers).
pub fn bash_output(s: &str) -> Option<CommandOutput> {
    let t = s.trim_start();
    if !t.starts_with("<bash-stdout") && !t.starts_with("<bash-stderr") {
        return None;
    }
    let mut killed = false;
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some((attrs, body)) = attr_tag_parts(t, "bash-stdout") {
        stdout = body.trim().to_string();
        killed |= attr_value(attrs, "status").as_deref() == Some("killed");
    }
    if let Some((attrs, body)) = attr_tag_parts(t, "bash-stderr") {
        stderr = body.trim().to_string();
        killed |= attr_value(attrs, "status").as_deref() == Some("killed");
    }

    let mut text = stdout;
    if !stderr.is_empty() {
        if text.is_empty() {
            text = stderr.clone();
        } else {
            text.push('\n');
            text.push_str(&stderr);
        }
    }
    Some(CommandOutput {
        text,
        is_error: !stderr.is_empty() || killed,
    })
}

/// Summary of a background-task notification wrapper.
pub fn task_notification(s: &str) -> Option<CommandOutput> {
    let t = s.trim_start();
    if !t.starts_with("<task-notification") {
        return None;
    }
    let (attrs, body) = attr_tag_parts(t, "task-notification")?;
    let text = attr_value(attrs, "summary")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    Some(CommandOutput {
        text,
        is_error: attr_value(attrs, "status").as_deref() == Some("killed"),
    })
}

/// Single-line `/name args` rendering of a command wrapper.
pub fn command_display(s: &str) -> Option<String> {
    let t = s.trim_start();
    if !t.starts_with("<command-name>") && !t.starts_with("<command-message>") {
        return None;
    }
    let name = inner_between(t, "<command-name>", "</command-name>")?.trim();
    if name.is_empty() || !name.starts_with('/') {
        return None;
    }
    let args = inner_between(t, "<command-args>", "</command-args>")
        .map(str::trim)
        .unwrap_or("");
    if args.is_empty() {
        Some(name.to_string())
    } else {
        Some(format!("{name} {args}"))
    }
}

/// Attributes and body of a teammate-message wrapper, taken from RAW
/// content. Sanitisation is lossy, so colour and summary must be pulled
/// here, never recovered from chunk text later.
#[derive(Debug, Clone, PartialEq)]
pub struct TeammateAttrs {
    pub teammate_id: String,
    pub color: String,
    pub summary: Option<String>,
    pub body: String,
}

pub fn teammate_attrs(s: &str) -> Option<TeammateAttrs> {
    let (attrs, body) = attr_tag_parts(s, "teammate-message")?;
    Some(TeammateAttrs {
        teammate_id: attr_value(attrs, "teammate_id").unwrap_or_default(),
        color: attr_value(attrs, "color").unwrap_or_default(),
        summary: attr_value(attrs, "summary"),
        body: body.trim().to_string(),
    })
}

/// Strip noise wrappers and convert command XML to display form.
pub fn sanitize_content(s: &str) -> String {
    let t = s.trim();
    if let Some(out) = local_command_output(t) {
        return out.text;
    }
    if let Some(cmd) = command_display(t) {
        return cmd;
    }
    let stripped = CAVEAT_RE.replace_all(t, "");
    let stripped = REMINDER_RE.replace_all(&stripped, "");
    let stripped = COMMAND_WRAPPER_RE.replace_all(&stripped, "");
    let stripped = BASH_INPUT_RE.replace_all(&stripped, "$1");
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_string() {
        assert_eq!(extract_text(&json!("hi")), "hi");
    }

    #[test]
    fn test_extract_text_array_joins_text_blocks() {
        let content = json!([
            {"type": "text", "text": "one"},
            {"type": "tool_result", "tool_use_id": "t", "content": "x"},
            {"type": "text", "text": "two"},
        ]);
        assert_eq!(extract_text(&content), "one\ntwo");
    }

    #[test]
    fn test_extract_text_other_shapes_empty() {
        assert_eq!(extract_text(&json!(null)), "");
        assert_eq!(extract_text(&json!({"type": "text"})), "");
    }

    #[test]
    fn test_extract_command_output() {
        let s = "<local-command-stdout>on branch main\n</local-command-stdout>";
        assert_eq!(extract_command_output(s).as_deref(), Some("on branch main"));
        let e = "<local-command-stderr>boom</local-command-stderr>";
        assert_eq!(extract_command_output(e).as_deref(), Some("boom"));
        assert!(extract_command_output("plain").is_none());
    }

    #[test]
    fn test_local_command_output_flags_stderr() {
        let s = "<local-command-stdout>out</local-command-stdout><local-command-stderr>err</local-command-stderr>";
        let out = local_command_output(s).unwrap();
        assert_eq!(out.text, "out\nerr");
        assert!(out.is_error);

        let clean = local_command_output("<local-command-stdout>ls\n</local-command-stdout>").unwrap();
        assert_eq!(clean.text, "ls");
        assert!(!clean.is_error);
    }

    #[test]
    fn test_bash_output_killed_status() {
        let s = r#"<bash-stdout status="killed">partial</bash-stdout>"#;
        let out = bash_output(s).unwrap();
        assert_eq!(out.text, "partial");
        assert!(out.is_error);
    }

    #[test]
    fn test_task_notification_prefers_summary_attr() {
        let s = r#"<task-notification summary="agent done">long body</task-notification>"#;
        let out = task_notification(s).unwrap();
        assert_eq!(out.text, "agent done");
        assert!(!out.is_error);

        let bare = task_notification("<task-notification>body text</task-notification>").unwrap();
        assert_eq!(bare.text, "body text");
    }

    #[test]
    fn test_command_display() {
        let s = "<command-name>/commit</command-name>\n<command-message>commit</command-message>\n<command-args>--amend</command-args>";
        assert_eq!(command_display(s).as_deref(), Some("/commit --amend"));

        let bare = "<command-name>/exit</command-name>";
        assert_eq!(command_display(bare).as_deref(), Some("/exit"));

        // Names without a leading slash are documentation text, not commands.
        assert!(command_display("<command-name>commit</command-name>").is_none());
    }

    #[test]
    fn test_teammate_attrs() {
        let s = r#"<teammate-message teammate_id="researcher" color="blue" summary="scan repo">found 3 crates</teammate-message>"#;
        let attrs = teammate_attrs(s).unwrap();
        assert_eq!(attrs.teammate_id, "researcher");
        assert_eq!(attrs.color, "blue");
        assert_eq!(attrs.summary.as_deref(), Some("scan repo"));
        assert_eq!(attrs.body, "found 3 crates");
    }

    #[test]
    fn test_teammate_attrs_without_summary() {
        let s = r#"<teammate-message teammate_id="w1" color="red">hello</teammate-message>"#;
        let attrs = teammate_attrs(s).unwrap();
        assert!(attrs.summary.is_none());
    }

    #[test]
    fn test_sanitize_strips_noise_wrappers() {
        let s = "ask me\n<system-reminder>internal</system-reminder>\n<local-command-caveat>x</local-command-caveat>";
        assert_eq!(sanitize_content(s), "ask me");
    }

    #[test]
    fn test_sanitize_keeps_bash_input_inner() {
        assert_eq!(sanitize_content("<bash-input>cargo check</bash-input>"), "cargo check");
    }

    #[test]
    fn test_sanitize_command_wrapper_to_display_form() {
        let s = "<command-name>/review</command-name><command-message>review</command-message>";
        assert_eq!(sanitize_content(s), "/review");
    }

    #[test]
    fn test_sanitize_stdout_wrapper_returns_inner() {
        assert_eq!(
            sanitize_content("<local-command-stdout>done</local-command-stdout>"),
            "done"
        );
    }

    #[test]
    fn test_is_hard_noise() {
        assert!(is_hard_noise("<system-reminder>tick</system-reminder>"));
        assert!(is_hard_noise("<local-command-caveat>c</local-command-caveat>"));
        assert!(!is_hard_noise("real text <system-reminder>x</system-reminder>"));
    }
}
