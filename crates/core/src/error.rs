//! Error types for the Ferrite domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

/// Errors surfaced by `query` / `query_stream`.
///
/// Anything the agent loop cannot recover from by nudging the model or by
/// round-tripping a tool-error turn ends up here. Recoverable conditions
/// (tool failures, invalid arguments, empty responses) are converted into
/// conversational turns instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Maximum iterations exceeded ({0})")]
    MaxIterationsExceeded(u32),

    #[error("Maximum tool calls exceeded ({0})")]
    MaxToolCallsExceeded(u32),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using `AgentError`.
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors returned by tool implementations and the registry.
///
/// The registry translates these into [`crate::tool::ToolErrorKind`] values on
/// the `ToolResult` it hands back; individual tool failures never abort the
/// agent loop.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool cancelled: {tool_name}")]
    Cancelled { tool_name: String },

    #[error("Not allowed: {tool_name} — {reason}")]
    NotAllowed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool error [{code}]: {reason}")]
    Specific { code: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Corrupt session data: {0}")]
    Corrupt(String),
}
