//! Pulling a JSON object out of free-form oracle output.
//!
//! Oracles wrap answers in prose and code fences, and sometimes emit almost-
//! JSON. Extraction tries a ```` ```json ```` fence, then any fence, then the
//! bare text; each candidate is parsed as-is and then through a short list of
//! textual repairs.

use serde_json::{Map, Value};

/// Parse the first JSON object found in `text`.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut regions: Vec<&str> = Vec::with_capacity(3);
    if let Some(body) = fenced_block(text, true) {
        regions.push(body);
    }
    if let Some(body) = fenced_block(text, false) {
        regions.push(body);
    }
    regions.push(text);

    regions.into_iter().find_map(object_in_region)
}

fn object_in_region(region: &str) -> Option<Map<String, Value>> {
    let start = region.find('{')?;
    let candidate = match find_matching_brace(region, start) {
        Some(end) => &region[start..=end],
        // Truncated output: hand the tail to the brace repair.
        None => &region[start..],
    };
    match repair_json(candidate)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Body of the first fenced code block; `json_only` restricts it to
/// blocks tagged `json`.
fn fenced_block(text: &str, json_only: bool) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let line_end = after.find('\n').unwrap_or(after.len());
        let tag = after[..line_end].trim();
        let body_start = (line_end + 1).min(after.len());
        let body = &after[body_start..];
        let close = body.find("```");

        if !json_only || tag.eq_ignore_ascii_case("json") {
            return Some(match close {
                Some(end) => &body[..end],
                None => body,
            });
        }
        match close {
            Some(end) => rest = &body[end + 3..],
            None => return None,
        }
    }
    None
}

/// Index of the `}` closing the `{` at `start`, ignoring braces inside strings.
fn find_matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ─── Repairs ─────────────────────────────────────────────────────────────────

/// Parse `raw`, applying repairs cumulatively until one parses.
///
/// Repairs, in order: a doubled opening quote on a value (`":""/path"`),
/// trailing commas, missing closing braces, stray control characters.
pub fn repair_json(raw: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str(raw) {
        return Some(v);
    }

    let repairs: [fn(&str) -> String; 4] = [
        collapse_doubled_quotes,
        strip_trailing_commas,
        close_unbalanced_braces,
        strip_control_characters,
    ];
    let mut repaired = raw.to_string();
    for repair in repairs {
        repaired = repair(&repaired);
        if let Ok(v) = serde_json::from_str(&repaired) {
            return Some(v);
        }
    }
    None
}

/// `"key":""value"` → `"key":"value"`. A real empty string (`:""` before
/// `,` or `}`) is left alone.
fn collapse_doubled_quotes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let doubled = bytes.get(i..i + 3) == Some(b":\"\"".as_slice())
            && bytes
                .get(i + 3)
                .is_some_and(|next| !matches!(next, b',' | b'}' | b' ' | b'\n'));
        if doubled {
            out.extend_from_slice(b":\"");
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn close_unbalanced_braces(input: &str) -> String {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }

    let mut out = input.to_string();
    if in_string {
        out.push('"');
    }
    for _ in 0..depth.max(0) {
        out.push('}');
    }
    out
}

/// Drop control characters other than `\n`, `\r` and `\t`.
fn strip_control_characters(input: &str) -> String {
    input
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parsed(text: &str) -> Value {
        Value::Object(parse_json_object(text).unwrap())
    }

    #[test]
    fn test_prefers_json_fence() {
        let text = "Here you go:\n```text\n{\"wrong\": true}\n```\n```json\n{\"file_path\": \"a.rs\"}\n```";
        assert_eq!(parsed(text), json!({"file_path": "a.rs"}));
    }

    #[test]
    fn test_any_fence_then_raw() {
        assert_eq!(parsed("```\n{\"a\": 1}\n```"), json!({"a": 1}));
        assert_eq!(
            parsed("Corrected input: {\"pattern\": \"fn {\"} as requested."),
            json!({"pattern": "fn {"})
        );
    }

    #[test]
    fn test_repairs_trailing_comma_and_truncation() {
        assert_eq!(parsed("{\"a\": 1, \"b\": [1, 2,],}"), json!({"a": 1, "b": [1, 2]}));
        assert_eq!(
            parsed("{\"todos\": [{\"content\": \"x\"}]"),
            json!({"todos": [{"content": "x"}]})
        );
    }

    #[test]
    fn test_repairs_doubled_quote() {
        assert_eq!(
            parsed("{\"file_path\":\"\"/tmp/a.rs\"}"),
            json!({"file_path": "/tmp/a.rs"})
        );
        assert_eq!(parsed("{\"old_string\":\"\",\"new_string\":\"x\"}")["old_string"], "");
    }

    #[test]
    fn test_no_object() {
        assert!(parse_json_object("I cannot help with that.").is_none());
        assert!(parse_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_find_matching_brace_skips_strings() {
        let text = r#"{"a": "}", "b": {"c": "\"}"}} tail"#;
        let end = find_matching_brace(text, 0).unwrap();
        assert_eq!(&text[end + 1..], " tail");
    }
}
