//! Condensing conversation text for oracle prompts.

use crate::tools::{Message, Role};

/// Longest per-message preview included in a condensed transcript.
const MESSAGE_PREVIEW_BYTES: usize = 500;

// ─── UTF-8 Safe Truncation ──────────────────────────────────────────────────

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Transcript ─────────────────────────────────────────────────────────────

/// One line per turn: role label, text preview, and any tool names called.
pub fn summarize_turn(message: &Message) -> String {
    let label = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool result",
        Role::System => "system",
    };

    let text = message.content.trim();
    let mut line = if text.is_empty() {
        format!("{label}:")
    } else {
        let preview = truncate_utf8(text, MESSAGE_PREVIEW_BYTES);
        let ellipsis = if preview.len() < text.len() { "…" } else { "" };
        format!("{label}: {}{ellipsis}", preview.replace('\n', " "))
    };

    if message.has_tool_calls() {
        let names: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
        line.push_str(&format!(" [called: {}]", names.join(", ")));
    }
    line
}

/// The last `window` non-system turns, oldest first, one per line.
pub fn condense_transcript(messages: &[Message], window: usize) -> String {
    let relevant: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
    let start = relevant.len().saturating_sub(window);
    relevant[start..]
        .iter()
        .map(|m| summarize_turn(m))
        .collect::<Vec<_>>()
        .join("\n")
}
