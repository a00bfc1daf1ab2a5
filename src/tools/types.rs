//! Conversation, tool call and tool schema types.
//!
//! These mirror the agentic client's wire shapes closely enough to be
//! deserialized straight from a proxied request, but carry no transport
//! concerns. Tool inputs stay as `serde_json` maps so correctors can rewrite
//! them without a schema-specific type per tool.

use serde::{Deserialize, Serialize};

/// Tool call input: a JSON object keyed by parameter name.
pub type ToolInput = serde_json::Map<String, serde_json::Value>;

/// The `type` tag carried by every tool call block.
pub const TOOL_USE_TYPE: &str = "tool_use";

fn default_tool_use_type() -> String {
    TOOL_USE_TYPE.to_string()
}

// ─── Conversation ────────────────────────────────────────────────────────────

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single conversation turn.
///
/// Assistant turns may carry tool calls alongside (or instead of) text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// An assistant turn that invoked one or more tools.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ─── Tool Calls ──────────────────────────────────────────────────────────────

/// A tool invocation emitted by the model.
///
/// `id` and `type` are fixed for the lifetime of a call; correction only ever
/// rewrites `name` and `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(rename = "type", default = "default_tool_use_type")]
    pub r#type: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: ToolInput,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: ToolInput) -> Self {
        Self {
            r#type: TOOL_USE_TYPE.to_string(),
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Build a call from a `serde_json::Value`, treating non-objects as empty input.
    pub fn from_value(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        let input = match input {
            serde_json::Value::Object(map) => map,
            _ => ToolInput::new(),
        };
        Self::new(id, name, input)
    }

    /// Same identity (`id`, `type`), different name and input.
    pub fn with_name_and_input(&self, name: impl Into<String>, input: ToolInput) -> Self {
        Self {
            r#type: self.r#type.clone(),
            id: self.id.clone(),
            name: name.into(),
            input,
        }
    }

    /// Same identity and name, different input.
    pub fn with_input(&self, input: ToolInput) -> Self {
        self.with_name_and_input(self.name.clone(), input)
    }

    /// Input as a `serde_json::Value` object, for prompts and logs.
    pub fn input_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.input.clone())
    }
}

/// One item of an assistant content batch.
///
/// Anything that does not deserialize as a tool call is carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    ToolUse(ToolCall),
    Other(serde_json::Value),
}

impl ContentBlock {
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::ToolUse(call) => Some(call),
            Self::Other(_) => None,
        }
    }
}

impl From<ToolCall> for ContentBlock {
    fn from(call: ToolCall) -> Self {
        Self::ToolUse(call)
    }
}

// ─── Tool Schemas ────────────────────────────────────────────────────────────

/// The subset of a JSON Schema object the validator consults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl InputSchema {
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

/// A tool definition offered to the model for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: InputSchema,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        required: &[&str],
        properties: &[&str],
    ) -> Self {
        let properties = properties
            .iter()
            .map(|p| ((*p).to_string(), serde_json::json!({})))
            .collect();
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema {
                required: required.iter().map(|r| (*r).to_string()).collect(),
                properties,
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
