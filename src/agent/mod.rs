//! Agent building blocks: transcript, tools, model invocation and dispatch.
//!
//! The conversation loop that ties these together lives in
//! [`crate::orchestrator`].

mod dispatcher;
mod model;
mod registry;
mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{ToolDispatcher, INVALID_TOOL_MESSAGE};
pub use model::{decode_response, encode_transcript, ModelInvoker, OpenAiModel};
pub use registry::{
    optional_u64, required_str, Tool, ToolDefinition, ToolError, ToolLookup, ToolRegistry,
    ToolRegistryBuilder,
};
pub use transcript::{Message, Role, ToolRequest, Transcript};
