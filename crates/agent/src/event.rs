//! Agent-level streaming events.
//!
//! `query_stream` yields these over an mpsc channel. A consumer sees zero or
//! more `message_chunk`/tool events followed by exactly one of `complete` or
//! `error` — or a bare channel close if the query was cancelled externally.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during streaming execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Partial text from the LLM.
    MessageChunk { content: String },

    /// A tool call is about to be dispatched.
    ToolStart {
        id: String,
        name: String,
        arguments: serde_json::Value,
        raw_arguments: String,
    },

    /// Tool execution completed (success or ordinary failure).
    ToolResult {
        id: String,
        name: String,
        output: String,
    },

    /// Tool execution was cancelled.
    ToolCancel { id: String, name: String },

    /// Tool execution hit its deadline.
    ToolTimeout { id: String, name: String },

    /// A fatal error terminated the query.
    Error { message: String },

    /// The query finished with a final answer.
    Complete,
}
