mod classify;
mod decode;
mod lines;
mod sanitize;
mod schema;
mod tool_summary;

pub use classify::classify;
pub use decode::{Entry, parse_entry, parse_timestamp, zero_time};
pub use lines::{LineReader, MAX_LINE_BYTES};
pub use sanitize::{
    CommandOutput, TeammateAttrs, bash_output, command_display, extract_command_output,
    extract_text, is_hard_noise, local_command_output, sanitize_content, task_notification,
    teammate_attrs,
};
pub use tool_summary::summarize_tool_input;
