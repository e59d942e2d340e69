//! Progress callback surface.
//!
//! An optional, synchronous notification channel for callers that want to
//! show loop activity (a spinner, a status line) without consuming the full
//! streaming event channel.

/// Coarse-grained loop progress notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The loop started iteration `current` of at most `max`.
    Iteration { current: u32, max: u32 },

    /// The assistant requested a batch of `count` tool calls.
    ToolCallsStart { count: usize },

    /// One tool call in the batch is about to run.
    ToolCall { name: String },

    /// The assistant produced neither tool calls nor text; the loop is
    /// nudging it toward a plain answer.
    NoTools,
}

/// Implemented by callers who want progress notifications.
///
/// Handlers are invoked inline on the query worker, so they should return
/// quickly and never block.
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}
