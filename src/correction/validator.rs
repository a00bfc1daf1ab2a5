//! Tool-call validation against the request's tool schemas.
//!
//! Validation is pure: it reports what is wrong and, for name problems,
//! what the call should have been. Repairs live in [`super::correctors`].

use std::sync::Arc;

use serde_json::Value;

use crate::tools::names;
use crate::tools::registry::{is_tool_available, schema_for};
use crate::tools::{resolve_name, NameResolution, SchemaRegistry, Tool, ToolCall, ToolInput};

use super::types::ValidationResult;

/// Keys that belong at the top level of a batch edit, never inside an entry.
pub const FORBIDDEN_EDIT_KEYS: &[&str] = &[
    "file_path",
    "filepath",
    "filename",
    "path",
    "file",
    "target_path",
    "source_path",
];

/// Fields a canonical todo item carries.
pub const TODO_FIELDS: &[&str] = &["content", "status", "priority", "id"];

/// Checks tool calls against schemas from the request, then the registry.
#[derive(Clone)]
pub struct ToolCallValidator {
    registry: Arc<dyn SchemaRegistry>,
}

impl ToolCallValidator {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &dyn SchemaRegistry {
        self.registry.as_ref()
    }

    /// Schema for `name`, from the request's tools first.
    pub fn schema_for(&self, tools: &[Tool], name: &str) -> Option<Tool> {
        schema_for(tools, self.registry.as_ref(), name)
    }

    /// Validate `call` against `tools`, falling back to the registry.
    pub fn validate(&self, call: &ToolCall, tools: &[Tool]) -> ValidationResult {
        let mut result = ValidationResult::default();

        let schema = match resolve_name(tools, &call.name) {
            NameResolution::Exact(tool) => tool.clone(),
            NameResolution::CaseMismatch(tool) => {
                result.has_case_issue = true;
                result.correct_tool_name = Some(tool.name.clone());
                tool.clone()
            }
            NameResolution::NotFound => {
                if let Some(input) = self.slash_command_input(call, tools) {
                    result.has_tool_name_issue = true;
                    result.correct_tool_name = Some(names::TASK.to_string());
                    result.corrected_input = Some(input);
                    return result;
                }
                match self.registry.get_schema(&call.name) {
                    Some(tool) => tool,
                    None => {
                        result.unknown_tool = true;
                        return result;
                    }
                }
            }
        };

        check_parameters(&schema, &call.input, &mut result);
        result.structural_issues = structural_issues(&schema.name, &call.input);

        if schema.name == names::WEB_FETCH
            && is_tool_available(tools, self.registry.as_ref(), names::READ)
        {
            if let Some(path) = local_file_url(&call.input) {
                let mut input = ToolInput::new();
                input.insert("file_path".into(), Value::String(path));
                result.has_tool_name_issue = true;
                result.correct_tool_name = Some(names::READ.to_string());
                result.corrected_input = Some(input);
            }
        }

        result.is_valid = !result.has_param_issues()
            && !result.has_case_issue
            && !result.has_tool_name_issue
            && !result.unknown_tool;
        result
    }

    /// `/review-pr` style names become a `Task` when one is available.
    fn slash_command_input(&self, call: &ToolCall, tools: &[Tool]) -> Option<ToolInput> {
        let command = call.name.strip_prefix('/')?.trim();
        if command.is_empty() || !is_tool_available(tools, self.registry.as_ref(), names::TASK) {
            return None;
        }

        let mut input = call.input.clone();
        input.insert(
            "description".into(),
            Value::String(slash_command_title(command)),
        );
        input.insert("prompt".into(), Value::String(call.name.clone()));
        Some(input)
    }
}

// ─── Parameter Checks ────────────────────────────────────────────────────────

fn check_parameters(schema: &Tool, input: &ToolInput, result: &mut ValidationResult) {
    result.missing_params = schema
        .input_schema
        .required
        .iter()
        .filter(|key| !input.contains_key(key.as_str()))
        .cloned()
        .collect();

    // Task forwards free-form options to the sub-agent.
    if schema.name == names::TASK || schema.input_schema.properties.is_empty() {
        return;
    }
    result.invalid_params = input
        .keys()
        .filter(|key| !schema.input_schema.has_property(key))
        .cloned()
        .collect();
}

// ─── Structural Checks ───────────────────────────────────────────────────────

/// Shape problems that a parameter-name check cannot see.
pub fn structural_issues(tool_name: &str, input: &ToolInput) -> Vec<String> {
    match tool_name {
        names::MULTI_EDIT => batch_edit_issues(input),
        names::TODO_WRITE => todo_issues(input),
        _ => Vec::new(),
    }
}

/// Path keys nested inside batch-edit entries.
pub fn batch_edit_issues(input: &ToolInput) -> Vec<String> {
    let Some(edits) = input.get("edits") else {
        return Vec::new();
    };
    let Some(entries) = edits.as_array() else {
        return vec!["edits must be an array".to_string()];
    };

    let mut issues = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            issues.push(format!("edits[{i}] is not an object"));
            continue;
        };
        for key in FORBIDDEN_EDIT_KEYS {
            if obj.contains_key(*key) {
                issues.push(format!("edits[{i}] contains nested path key '{key}'"));
            }
        }
    }
    issues
}

/// Todo items that are not `{content, status, priority, id}` objects.
pub fn todo_issues(input: &ToolInput) -> Vec<String> {
    let Some(todos) = input.get("todos") else {
        return Vec::new();
    };
    let Some(items) = todos.as_array() else {
        return vec!["todos must be an array".to_string()];
    };

    let mut issues = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            issues.push(format!("todos[{i}] is not an object"));
            continue;
        };
        for alias in ["description", "task"] {
            if obj.contains_key(alias) {
                issues.push(format!("todos[{i}] uses '{alias}' instead of 'content'"));
            }
        }
        for field in ["content", "priority"] {
            if !obj.contains_key(field) {
                issues.push(format!("todos[{i}] is missing '{field}'"));
            }
        }
    }
    issues
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Local path named by a `file://` URL, if `url` is one.
pub fn file_url_path(url: &str) -> Option<String> {
    let url = url.trim();
    let scheme = url.get(..7)?;
    if !scheme.eq_ignore_ascii_case("file://") {
        return None;
    }
    let rest = &url[7..];
    let path = rest.strip_prefix("localhost").unwrap_or(rest);
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

fn local_file_url(input: &ToolInput) -> Option<String> {
    input.get("url").and_then(Value::as_str).and_then(file_url_path)
}

/// `review-pr` → `Review Pr`.
fn slash_command_title(command: &str) -> String {
    let head = command.split_whitespace().next().unwrap_or(command);
    head.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::StaticSchemaRegistry;

    fn validator() -> ToolCallValidator {
        ToolCallValidator::new(Arc::new(StaticSchemaRegistry::with_builtin_tools()))
    }

    fn builtin(wanted: &[&str]) -> Vec<Tool> {
        let registry = StaticSchemaRegistry::with_builtin_tools();
        wanted.iter().filter_map(|n| registry.get_schema(n)).collect()
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall::from_value("toolu_1", name, input)
    }

    #[test]
    fn test_valid_call() {
        let result = validator().validate(
            &call("Read", json!({"file_path": "/src/main.rs"})),
            &builtin(&["Read"]),
        );
        assert!(result.is_valid);
        assert!(result.is_acceptable());
    }

    #[test]
    fn test_missing_and_invalid_params() {
        let result = validator().validate(
            &call("Read", json!({"path": "/src/main.rs"})),
            &builtin(&["Read"]),
        );
        assert!(!result.is_valid);
        assert_eq!(result.missing_params, vec!["file_path"]);
        assert_eq!(result.invalid_params, vec!["path"]);
    }

    #[test]
    fn test_case_mismatch() {
        let result = validator().validate(
            &call("read", json!({"file_path": "a.rs"})),
            &builtin(&["Read"]),
        );
        assert!(result.has_case_issue);
        assert_eq!(result.correct_tool_name.as_deref(), Some("Read"));
        assert!(!result.is_valid);
        assert!(result.missing_params.is_empty());
    }

    #[test]
    fn test_registry_fallback_for_unlisted_tool() {
        let result = validator().validate(&call("Glob", json!({"pattern": "**/*.rs"})), &[]);
        assert!(result.is_valid);
        assert!(!result.unknown_tool);
    }

    #[test]
    fn test_unknown_tool() {
        let result = validator().validate(&call("Teleport", json!({})), &builtin(&["Read"]));
        assert!(result.unknown_tool);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_slash_command_becomes_task() {
        let result = validator().validate(
            &call("/review-pr", json!({"pr": 42})),
            &builtin(&["Task", "Read"]),
        );
        assert!(result.has_tool_name_issue);
        assert_eq!(result.correct_tool_name.as_deref(), Some("Task"));

        let input = result.corrected_input.unwrap();
        assert_eq!(input["description"], "Review Pr");
        assert_eq!(input["prompt"], "/review-pr");
        assert_eq!(input["pr"], 42);
    }

    #[test]
    fn test_slash_command_without_task_is_unknown() {
        let validator = ToolCallValidator::new(Arc::new(StaticSchemaRegistry::new()));
        let result = validator.validate(&call("/review-pr", json!({})), &builtin(&["Read"]));
        assert!(result.unknown_tool);
    }

    #[test]
    fn test_task_tolerates_extra_params() {
        let result = validator().validate(
            &call(
                "Task",
                json!({"description": "d", "prompt": "p", "model": "fast"}),
            ),
            &builtin(&["Task"]),
        );
        assert!(result.is_valid);
    }

    #[test]
    fn test_batch_edit_nested_path_is_structural() {
        let result = validator().validate(
            &call(
                "MultiEdit",
                json!({
                    "file_path": "a.rs",
                    "edits": [{"file_path": "a.rs", "old_string": "x", "new_string": "y"}]
                }),
            ),
            &builtin(&["MultiEdit"]),
        );
        assert!(result.is_valid);
        assert!(!result.is_acceptable());
        assert_eq!(
            result.structural_issues,
            vec!["edits[0] contains nested path key 'file_path'"]
        );
    }

    #[test]
    fn test_todo_issues() {
        let issues = todo_issues(
            json!({"todos": [{"description": "Fix bug", "status": "pending"}]})
                .as_object()
                .unwrap(),
        );
        assert!(issues.contains(&"todos[0] uses 'description' instead of 'content'".to_string()));
        assert!(issues.contains(&"todos[0] is missing 'content'".to_string()));
        assert!(issues.contains(&"todos[0] is missing 'priority'".to_string()));

        let issues = todo_issues(json!({"todos": "Fix bug"}).as_object().unwrap());
        assert_eq!(issues, vec!["todos must be an array"]);
    }

    #[test]
    fn test_web_fetch_of_local_file_targets_read() {
        let result = validator().validate(
            &call(
                "WebFetch",
                json!({"url": "file:///etc/hosts", "prompt": "show it"}),
            ),
            &builtin(&["WebFetch", "Read"]),
        );
        assert!(result.has_tool_name_issue);
        assert!(!result.is_valid);
        assert_eq!(result.correct_tool_name.as_deref(), Some("Read"));
        assert_eq!(
            result.corrected_input.unwrap()["file_path"],
            json!("/etc/hosts")
        );
    }

    #[test]
    fn test_file_url_path() {
        assert_eq!(file_url_path("file:///a/b.txt").as_deref(), Some("/a/b.txt"));
        assert_eq!(
            file_url_path("FILE://localhost/a/b.txt").as_deref(),
            Some("/a/b.txt")
        );
        assert_eq!(file_url_path("https://example.com"), None);
        assert_eq!(file_url_path("file://"), None);
    }
}
