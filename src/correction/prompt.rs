//! Oracle prompt for tool-call repair.

use crate::oracle::condense::truncate_utf8;
use crate::tools::names;
use crate::tools::{Tool, ToolCall};

use super::types::ValidationResult;

pub const REPAIR_SYSTEM_PROMPT: &str = "\
You repair malformed tool calls for a coding assistant. \
Reply with ONLY the corrected tool input as one JSON object and nothing else. \
Keep every value the caller supplied; rename, restructure or drop keys so the \
input matches the schema. Do not invent file contents or commands.";

/// Longest serialized input included in the prompt.
const MAX_INPUT_BYTES: usize = 4000;

/// Extra guidance for tools whose inputs are commonly malformed.
fn tool_hint(tool: &str) -> Option<&'static str> {
    match tool {
        names::MULTI_EDIT => Some(
            "`file_path` belongs only at the top level. Each entry of `edits` has \
             `old_string`, `new_string` and optionally `replace_all`, never a path.",
        ),
        names::TODO_WRITE => Some(
            "`todos` is an array of objects, each with `content` (string), `status` \
             (pending | in_progress | completed), `priority` (high | medium | low) and `id` (string).",
        ),
        names::EDIT => Some("`old_string` is the exact text to replace; `new_string` replaces it."),
        names::TASK => Some(
            "`description` is a three to five word summary; `prompt` is the full instruction.",
        ),
        names::GREP => Some("`pattern` is a regular expression; `glob` filters files; `path` is a directory."),
        _ => None,
    }
}

/// User prompt describing the call, its schema and what is wrong with it.
pub fn build_repair_prompt(call: &ToolCall, schema: &Tool, result: &ValidationResult) -> String {
    let input = serde_json::to_string_pretty(&call.input_value()).unwrap_or_default();
    let input = truncate_utf8(&input, MAX_INPUT_BYTES);

    let mut allowed: Vec<&str> = schema
        .input_schema
        .properties
        .keys()
        .map(String::as_str)
        .collect();
    allowed.sort_unstable();

    let mut prompt = format!("Tool: {}\n", schema.name);
    if !schema.description.is_empty() {
        prompt.push_str(&format!("Description: {}\n", schema.description));
    }
    prompt.push_str(&format!(
        "Required parameters: {}\n",
        join_or_none(&schema.input_schema.required.iter().map(String::as_str).collect::<Vec<_>>())
    ));
    prompt.push_str(&format!("Allowed parameters: {}\n", join_or_none(&allowed)));

    prompt.push_str(&format!("\nCurrent input:\n{input}\n\nProblems:\n"));
    for issue in result.describe_issues() {
        prompt.push_str(&format!("- {issue}\n"));
    }

    if let Some(hint) = tool_hint(&schema.name) {
        prompt.push_str(&format!("\nNote: {hint}\n"));
    }
    prompt.push_str("\nCorrected input JSON:");
    prompt
}

fn join_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
