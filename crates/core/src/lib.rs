//! # Ferrite Core
//!
//! Domain types, traits, and error definitions for the Ferrite CLI assistant.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping providers and session stores via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod callid;
pub mod error;
pub mod history;
pub mod memory;
pub mod message;
pub mod progress;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use callid::generate_call_id;
pub use error::{AgentError, ProviderError, Result, SessionError, ToolError};
pub use history::SessionSink;
pub use memory::ConversationMemory;
pub use message::{Message, Role, ToolCall};
pub use progress::{ProgressEvent, ProgressHandler};
pub use provider::{
    ChatChoice, ChatRequest, ChatResponse, ChatStreamChunk, Provider, ToolCallDelta,
    ToolChoice, ToolDefinition, Usage,
};
pub use schema::{ParamKind, ParamSpec};
pub use tool::{Tool, ToolContext, ToolErrorKind, ToolRegistry, ToolResult};
