//! # Ferrite Agent
//!
//! The reason/act loop at the heart of the assistant. Drives a bounded
//! conversation between the user, an LLM provider, and the local tool
//! registry:
//!
//! 1. Append the user's question to memory.
//! 2. Call the provider with a snapshot of the conversation.
//! 3. Reconcile whatever tool-call convention the provider used — native
//!    structured calls, JSON embedded in assistant text, channel-tagged
//!    markup — into canonical tool calls.
//! 4. Execute the batch concurrently, feed results back as `tool` messages.
//! 5. Repeat until the model produces a final text answer or a resource
//!    bound trips.
//!
//! Two entry points: [`Agent::query`] (blocking) and [`Agent::query_stream`]
//! (event channel with rollback on cancellation).

pub mod delta;
pub mod event;
pub mod extract;
pub mod normalize;
pub mod prompt;
pub mod runner;

pub use delta::DeltaMerger;
pub use event::AgentEvent;
pub use extract::extract_tool_calls;
pub use normalize::normalize_arguments;
pub use runner::{Agent, AgentOptions, AgentResponse};
