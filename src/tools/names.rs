//! Names of the agent tool family the correctors know about.

/// Delegated sub-task tool. Tolerates unknown parameters.
pub const TASK: &str = "Task";
/// Local file read.
pub const READ: &str = "Read";
pub const WRITE: &str = "Write";
pub const EDIT: &str = "Edit";
/// Batch edit of a single file.
pub const MULTI_EDIT: &str = "MultiEdit";
pub const GREP: &str = "Grep";
pub const GLOB: &str = "Glob";
pub const BASH: &str = "Bash";
/// Structured todo list.
pub const TODO_WRITE: &str = "TodoWrite";
/// Remote URL fetch.
pub const WEB_FETCH: &str = "WebFetch";
pub const WEB_SEARCH: &str = "WebSearch";
pub const LS: &str = "LS";

/// Tools whose invocation means the assistant has already researched the codebase.
pub const RESEARCH_TOOLS: &[&str] = &[TASK, READ, GREP, GLOB];
