//! Tool call, conversation and schema types shared by both stages.

pub mod names;
pub mod registry;
pub mod types;

pub use registry::{resolve_name, NameResolution, SchemaRegistry, StaticSchemaRegistry};
pub use types::{ContentBlock, InputSchema, Message, Role, Tool, ToolCall, ToolInput};
