//! Deterministic repairs for common tool-call mistakes.
//!
//! Every corrector is a pure `(call) -> (call, applied)` function. `applied`
//! is false exactly when the returned call equals the input, so running a
//! corrector on its own output is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::names;
use crate::tools::{ToolCall, ToolInput};

use super::types::ValidationResult;
use super::validator::{file_url_path, FORBIDDEN_EDIT_KEYS, TODO_FIELDS};

/// Signature shared by every rule-based corrector.
pub type Corrector = fn(&ToolCall) -> (ToolCall, bool);

fn finish(call: &ToolCall, fixed: ToolCall) -> (ToolCall, bool) {
    let applied = fixed != *call;
    (fixed, applied)
}

// ─── Name Corrections ────────────────────────────────────────────────────────

/// Apply the validator's `correct_tool_name`, with its replacement input if any.
///
/// Covers both case fixes (name only) and slash-command rewrites.
pub fn apply_name_correction(call: &ToolCall, result: &ValidationResult) -> (ToolCall, bool) {
    let Some(ref name) = result.correct_tool_name else {
        return (call.clone(), false);
    };
    let input = result
        .corrected_input
        .clone()
        .unwrap_or_else(|| call.input.clone());
    finish(call, call.with_name_and_input(name.clone(), input))
}

/// `WebFetch` of a `file://` URL becomes `Read` of the local path.
pub fn correct_semantic_misuse(call: &ToolCall) -> (ToolCall, bool) {
    if !call.name.eq_ignore_ascii_case(names::WEB_FETCH) {
        return (call.clone(), false);
    }
    let Some(path) = call
        .input
        .get("url")
        .and_then(Value::as_str)
        .and_then(file_url_path)
    else {
        return (call.clone(), false);
    };

    let mut input = ToolInput::new();
    input.insert("file_path".into(), Value::String(path));
    finish(call, call.with_name_and_input(names::READ, input))
}

// ─── Parameter Renames ───────────────────────────────────────────────────────

const FILE_PATH_ALIASES: &[(&str, &str)] = &[
    ("filename", "file_path"),
    ("filepath", "file_path"),
    ("path", "file_path"),
    ("file", "file_path"),
];

/// `(alias, canonical)` pairs per tool, tried in order.
fn parameter_aliases(tool: &str) -> Vec<(&'static str, &'static str)> {
    match tool {
        names::READ | names::MULTI_EDIT => FILE_PATH_ALIASES.to_vec(),
        names::WRITE => {
            let mut v = FILE_PATH_ALIASES.to_vec();
            v.extend([("text", "content"), ("contents", "content"), ("data", "content")]);
            v
        }
        names::EDIT => {
            let mut v = FILE_PATH_ALIASES.to_vec();
            v.extend([
                ("old", "old_string"),
                ("old_text", "old_string"),
                ("search", "old_string"),
                ("new", "new_string"),
                ("new_text", "new_string"),
                ("replace", "new_string"),
                ("replacement", "new_string"),
            ]);
            v
        }
        names::GREP => vec![
            ("search", "pattern"),
            ("query", "pattern"),
            ("regex", "pattern"),
            ("filter", "glob"),
            ("include", "glob"),
            ("file_pattern", "glob"),
            ("directory", "path"),
            ("dir", "path"),
        ],
        names::GLOB => vec![
            ("search", "pattern"),
            ("query", "pattern"),
            ("glob", "pattern"),
            ("directory", "path"),
            ("dir", "path"),
        ],
        names::LS => vec![
            ("directory", "path"),
            ("dir", "path"),
            ("file_path", "path"),
        ],
        names::BASH => vec![("cmd", "command"), ("script", "command"), ("shell", "command")],
        names::WEB_FETCH => vec![
            ("uri", "url"),
            ("link", "url"),
            ("href", "url"),
            ("question", "prompt"),
        ],
        names::WEB_SEARCH => vec![("q", "query"), ("search", "query"), ("search_query", "query")],
        names::TASK => vec![
            ("task", "prompt"),
            ("instructions", "prompt"),
            ("instruction", "prompt"),
            ("title", "description"),
        ],
        names::TODO_WRITE => vec![("tasks", "todos"), ("items", "todos"), ("todo_list", "todos")],
        _ => Vec::new(),
    }
}

/// Rename well-known parameter aliases to their canonical keys.
///
/// An alias is only moved when the canonical key is absent.
pub fn rename_parameters(call: &ToolCall) -> (ToolCall, bool) {
    let aliases = parameter_aliases(&call.name);
    if aliases.is_empty() {
        return (call.clone(), false);
    }

    let mut input = call.input.clone();
    for (alias, canonical) in aliases {
        if input.contains_key(canonical) {
            continue;
        }
        if let Some(value) = input.remove(alias) {
            input.insert(canonical.to_string(), value);
        }
    }
    finish(call, call.with_input(input))
}

// ─── Tool-Specific Repairs ───────────────────────────────────────────────────

/// Dispatch to the repair for the call's tool, if it has one.
pub fn tool_specific_repair(call: &ToolCall) -> (ToolCall, bool) {
    match call.name.as_str() {
        names::TODO_WRITE => repair_todos(call),
        names::MULTI_EDIT => repair_batch_edit(call),
        _ => (call.clone(), false),
    }
}

// ─── Todo Lists ──────────────────────────────────────────────────────────────

/// Top-level keys a model uses when it skips the `todos` wrapper.
const LOOSE_TODO_KEYS: &[&str] = &["content", "todo", "task", "description", "title"];

/// Keys read as item text, best first.
const TODO_TEXT_KEYS: &[&str] = &["content", "description", "task", "title", "text", "todo", "name"];

const PLACEHOLDER_TODO: &str = "Review and update the task list";

static PRIORITY_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\s,;(\[-]*\bpriority\s*[:=]\s*(high|medium|low)\b[)\]]?")
        .expect("valid regex")
});

static PRIORITY_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\s,;(\[-]*\b(high|medium|low)[\s-]+priority\b[)\]]?").expect("valid regex")
});

static TASK_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*task\s*[:=]\s*").expect("valid regex"));

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)]|\[[ xX]?\])\s+").expect("valid regex"));

struct TodoItem {
    content: String,
    status: Option<String>,
    priority: Option<String>,
    id: Option<String>,
    extra: Map<String, Value>,
}

impl TodoItem {
    fn from_text(text: &str) -> Option<Self> {
        let (content, priority) = parse_task_string(text)?;
        Some(Self {
            content,
            status: None,
            priority,
            id: None,
            extra: Map::new(),
        })
    }

    fn from_object(obj: &Map<String, Value>) -> Option<Self> {
        let text = TODO_TEXT_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str).filter(|s| !s.trim().is_empty()))?;

        // Only free text without an explicit priority carries a priority marker.
        let mut item = match obj.get("priority").and_then(Value::as_str) {
            Some(priority) => Self {
                content: text.trim().to_string(),
                status: None,
                priority: Some(priority.to_string()),
                id: None,
                extra: Map::new(),
            },
            None => Self::from_text(text)?,
        };
        item.status = obj.get("status").and_then(Value::as_str).map(str::to_string);
        item.id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        item.extra = obj
            .iter()
            .filter(|(k, _)| !TODO_TEXT_KEYS.contains(&k.as_str()) && !TODO_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(item)
    }

    fn into_value(self) -> Value {
        let id = self.id.unwrap_or_else(|| slugify(&self.content));
        let mut obj = self.extra;
        obj.insert(
            "status".into(),
            Value::String(normalize_status(self.status.as_deref()).into()),
        );
        obj.insert(
            "priority".into(),
            Value::String(normalize_priority(self.priority.as_deref()).into()),
        );
        obj.insert("id".into(), Value::String(id));
        obj.insert("content".into(), Value::String(self.content));
        Value::Object(obj)
    }
}

/// Rewrite any recognisable todo payload into `{todos: [{content, status, priority, id}]}`.
///
/// Accepted shapes: an array of objects with wrong field names, a bare
/// string, a `"task, priority: high"` string, an array of strings, a single
/// object, and todo fields placed directly on the input. When nothing usable
/// is found a single placeholder item is written.
pub fn repair_todos(call: &ToolCall) -> (ToolCall, bool) {
    let mut input = call.input.clone();

    let items = match input.get("todos") {
        Some(todos) => items_from_value(todos),
        None => {
            let loose = loose_item(&input);
            if loose.is_some() {
                for key in LOOSE_TODO_KEYS.iter().chain(&["status", "priority", "id"]) {
                    input.remove(*key);
                }
            }
            loose.into_iter().collect()
        }
    };

    let todos: Vec<Value> = if items.is_empty() {
        let placeholder = TodoItem::from_text(PLACEHOLDER_TODO).map(TodoItem::into_value);
        placeholder.into_iter().collect()
    } else {
        items.into_iter().map(TodoItem::into_value).collect()
    };
    input.insert("todos".into(), Value::Array(todos));

    finish(call, call.with_input(input))
}

fn items_from_value(value: &Value) -> Vec<TodoItem> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) => TodoItem::from_text(s),
                Value::Object(obj) => TodoItem::from_object(obj),
                _ => None,
            })
            .collect(),
        Value::Object(obj) => TodoItem::from_object(obj).into_iter().collect(),
        Value::String(s) => {
            // Models sometimes serialise the list into a string.
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                if parsed.is_array() || parsed.is_object() {
                    return items_from_value(&parsed);
                }
            }
            s.lines().filter_map(TodoItem::from_text).collect()
        }
        _ => Vec::new(),
    }
}

fn loose_item(input: &ToolInput) -> Option<TodoItem> {
    let mut obj = Map::new();
    for key in LOOSE_TODO_KEYS.iter().chain(&["status", "priority", "id"]) {
        if let Some(v) = input.get(*key) {
            obj.insert((*key).to_string(), v.clone());
        }
    }
    if obj.is_empty() {
        return None;
    }
    TodoItem::from_object(&obj)
}

/// Split `"Fix login bug, priority: high"` into text and priority.
fn parse_task_string(text: &str) -> Option<(String, Option<String>)> {
    let mut text = BULLET_RE.replace(text, "").into_owned();
    text = TASK_PREFIX_RE.replace(&text, "").into_owned();

    let mut priority = None;
    for re in [&*PRIORITY_FIELD_RE, &*PRIORITY_WORD_RE] {
        if let Some(caps) = re.captures(&text) {
            priority = caps.get(1).map(|m| m.as_str().to_lowercase());
            text = re.replace(&text, "").into_owned();
            break;
        }
    }

    let content = text
        .trim()
        .trim_end_matches([',', ';', '-', ':'])
        .trim()
        .to_string();
    if content.is_empty() {
        return None;
    }
    Some((content, priority))
}

fn normalize_status(status: Option<&str>) -> &'static str {
    let Some(status) = status else {
        return "pending";
    };
    match status.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
        "in_progress" | "doing" | "active" | "started" | "wip" => "in_progress",
        "completed" | "complete" | "done" | "finished" => "completed",
        _ => "pending",
    }
}

fn normalize_priority(priority: Option<&str>) -> &'static str {
    match priority.map(|p| p.trim().to_lowercase()).as_deref() {
        Some("high" | "urgent" | "critical") => "high",
        Some("low") => "low",
        _ => "medium",
    }
}

/// `"Fix the Login bug!"` → `"fix-the-login-bug"`, at most 50 chars.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            c if c.is_whitespace() || c == '_' || c == '-' => {
                if !slug.is_empty() && !slug.ends_with('-') {
                    slug.push('-');
                }
            }
            c if c.is_ascii_alphanumeric() => slug.push(c.to_ascii_lowercase()),
            _ => {}
        }
    }
    slug.truncate(50);
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "task".to_string()
    } else {
        slug.to_string()
    }
}

// ─── Batch Edits ─────────────────────────────────────────────────────────────

/// Move a path nested inside batch-edit entries up to `file_path`.
///
/// Entries with neither `old_string` nor `new_string` are dropped. Returns
/// `applied = false` when `edits` is not an array, when no entry survives, or
/// when no path is available for the top level.
pub fn repair_batch_edit(call: &ToolCall) -> (ToolCall, bool) {
    let Some(edits) = call.input.get("edits").and_then(Value::as_array) else {
        return (call.clone(), false);
    };

    let mut recovered_path: Option<String> = None;
    let mut cleaned = Vec::with_capacity(edits.len());
    for entry in edits {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let mut obj = obj.clone();
        for key in FORBIDDEN_EDIT_KEYS {
            if let Some(value) = obj.remove(*key) {
                if recovered_path.is_none() {
                    recovered_path = value
                        .as_str()
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string);
                }
            }
        }
        if !obj.contains_key("old_string") && !obj.contains_key("new_string") {
            continue;
        }
        cleaned.push(Value::Object(obj));
    }

    if cleaned.is_empty() {
        return (call.clone(), false);
    }

    let mut input = call.input.clone();
    let has_path = input
        .get("file_path")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !has_path {
        match recovered_path {
            Some(path) => {
                input.insert("file_path".into(), Value::String(path));
            }
            None => return (call.clone(), false),
        }
    }
    input.insert("edits".into(), Value::Array(cleaned));

    finish(call, call.with_input(input))
}
