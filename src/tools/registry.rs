//! Tool schema lookup.
//!
//! Provides:
//! - Name resolution against the per-request tool list (exact, then
//!   case-insensitive)
//! - The `SchemaRegistry` fallback consulted when a tool is not offered in
//!   the request
//! - A static registry pre-loaded with the agent tool family

use std::collections::HashMap;

use super::names;
use super::types::Tool;

// ─── SchemaRegistry ──────────────────────────────────────────────────────────

/// Fallback source of tool schemas for tools the request did not declare.
pub trait SchemaRegistry: Send + Sync {
    fn get_schema(&self, name: &str) -> Option<Tool>;
}

/// In-memory schema registry keyed by exact tool name.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaRegistry {
    tools: HashMap<String, Tool>,
}

impl StaticSchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry containing the built-in agent tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for tool in builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Insert or replace a schema.
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Sorted tool names, for stable logging.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl SchemaRegistry for StaticSchemaRegistry {
    fn get_schema(&self, name: &str) -> Option<Tool> {
        self.tools.get(name).cloned()
    }
}

// ─── Name Resolution ─────────────────────────────────────────────────────────

/// Result of resolving a tool name against the request's tool list.
#[derive(Debug, Clone, PartialEq)]
pub enum NameResolution<'a> {
    /// Name found as-is.
    Exact(&'a Tool),

    /// Name matched only when compared case-insensitively.
    CaseMismatch(&'a Tool),

    NotFound,
}

impl<'a> NameResolution<'a> {
    pub fn tool(&self) -> Option<&'a Tool> {
        match self {
            Self::Exact(tool) | Self::CaseMismatch(tool) => Some(tool),
            Self::NotFound => None,
        }
    }
}

/// Resolve `name` against `tools`: exact match first, then ASCII case-insensitive.
pub fn resolve_name<'a>(tools: &'a [Tool], name: &str) -> NameResolution<'a> {
    if let Some(tool) = tools.iter().find(|t| t.name == name) {
        return NameResolution::Exact(tool);
    }
    if let Some(tool) = tools.iter().find(|t| t.name.eq_ignore_ascii_case(name)) {
        return NameResolution::CaseMismatch(tool);
    }
    NameResolution::NotFound
}

/// Whether `name` is offered in `tools` or known to the registry.
pub fn is_tool_available(tools: &[Tool], registry: &dyn SchemaRegistry, name: &str) -> bool {
    tools.iter().any(|t| t.name == name) || registry.get_schema(name).is_some()
}

/// Look up the schema for `name` in `tools`, falling back to the registry.
pub fn schema_for(tools: &[Tool], registry: &dyn SchemaRegistry, name: &str) -> Option<Tool> {
    resolve_name(tools, name)
        .tool()
        .cloned()
        .or_else(|| registry.get_schema(name))
}

// ─── Built-in Schemas ────────────────────────────────────────────────────────

fn builtin_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            names::TASK,
            "Launch a sub-agent to handle a multi-step task",
            &["description", "prompt"],
            &["description", "prompt", "subagent_type"],
        ),
        Tool::new(
            names::READ,
            "Read a file from the local filesystem",
            &["file_path"],
            &["file_path", "offset", "limit"],
        ),
        Tool::new(
            names::WRITE,
            "Write a file to the local filesystem",
            &["file_path", "content"],
            &["file_path", "content"],
        ),
        Tool::new(
            names::EDIT,
            "Replace a string in a file",
            &["file_path", "old_string", "new_string"],
            &["file_path", "old_string", "new_string", "replace_all"],
        ),
        Tool::new(
            names::MULTI_EDIT,
            "Apply several string replacements to one file",
            &["file_path", "edits"],
            &["file_path", "edits"],
        ),
        Tool::new(
            names::GREP,
            "Search file contents with a regular expression",
            &["pattern"],
            &[
                "pattern",
                "path",
                "glob",
                "type",
                "output_mode",
                "-i",
                "-n",
                "-A",
                "-B",
                "-C",
                "multiline",
                "head_limit",
            ],
        ),
        Tool::new(
            names::GLOB,
            "Find files by glob pattern",
            &["pattern"],
            &["pattern", "path"],
        ),
        Tool::new(
            names::BASH,
            "Run a shell command",
            &["command"],
            &["command", "description", "timeout", "run_in_background"],
        ),
        Tool::new(
            names::TODO_WRITE,
            "Create and manage a structured task list",
            &["todos"],
            &["todos"],
        ),
        Tool::new(
            names::WEB_FETCH,
            "Fetch a URL and process its content",
            &["url", "prompt"],
            &["url", "prompt"],
        ),
        Tool::new(
            names::WEB_SEARCH,
            "Search the web",
            &["query"],
            &["query", "allowed_domains", "blocked_domains"],
        ),
        Tool::new(
            names::LS,
            "List a directory",
            &["path"],
            &["path", "ignore"],
        ),
    ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
