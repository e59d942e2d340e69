//! Tool trait and registry — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: execute
//! shell commands, read/write files, do math, search the web. The registry
//! maps tool names to factories, generates provider-facing schemas, and
//! dispatches batches of calls concurrently with cancellation and per-call
//! timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::provider::ToolDefinition;
use crate::schema::{self, ParamSpec};

/// Default per-call execution deadline.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Execution context handed to each tool invocation.
///
/// Tools doing long-running work should observe `cancel`; the registry
/// enforces cancellation and the deadline around the call either way.
#[derive(Clone)]
pub struct ToolContext {
    pub cancel: CancellationToken,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Declared parameters; drives both schema generation and validation.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Execute the tool with validated JSON-object arguments.
    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a descriptor for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: schema::object_schema(&self.parameters()),
        }
    }
}

/// Classification of a failed tool call, fed back to the LLM and to
/// streaming consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    ExecutionError,
    Timeout,
    Cancelled,
    Validation,
    NotAllowed,
    ToolSpecific,
}

impl ToolErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExecutionError => "execution_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Validation => "validation",
            Self::NotAllowed => "not_allowed",
            Self::ToolSpecific => "tool_specific",
        }
    }
}

impl ToolError {
    /// The result kind this error maps to.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::Cancelled { .. } => ToolErrorKind::Cancelled,
            Self::InvalidArguments(_) => ToolErrorKind::Validation,
            Self::NotAllowed { .. } => ToolErrorKind::NotAllowed,
            Self::Specific { .. } => ToolErrorKind::ToolSpecific,
            _ => ToolErrorKind::ExecutionError,
        }
    }
}

/// The outcome of one tool call, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that ran
    pub name: String,

    /// Output text (empty on failure)
    pub output: String,

    /// Present when the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

/// The error half of a [`ToolResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(call: &ToolCall, kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            output: String::new(),
            error: Some(ToolFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The text fed back to the LLM as the `tool` message content.
    pub fn render(&self) -> String {
        match &self.error {
            None => self.output.clone(),
            Some(failure) => format!("Error ({}): {}", failure.kind.as_str(), failure.message),
        }
    }
}

type ToolFactory = Box<dyn Fn() -> Box<dyn Tool> + Send + Sync>;

/// A registry of available tools.
///
/// Registration is by name to a zero-argument factory that yields a fresh
/// tool instance per call. The factory map is write-once at startup; after
/// that the registry is shared behind an `Arc` and read concurrently.
pub struct ToolRegistry {
    factories: HashMap<String, ToolFactory>,
    tool_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override the per-call execution deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Register a tool factory. Fails if the name is already taken.
    pub fn register<F>(&mut self, factory: F) -> std::result::Result<(), ToolError>
    where
        F: Fn() -> Box<dyn Tool> + Send + Sync + 'static,
    {
        let name = factory().name().to_string();
        if self.factories.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered tool names, in unspecified order.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// `(name, description)` pairs for prompt augmentation.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.factories
            .values()
            .map(|f| {
                let tool = f();
                (tool.name().to_string(), tool.description().to_string())
            })
            .collect()
    }

    /// Descriptors for every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.factories.values().map(|f| f().to_definition()).collect()
    }

    /// Descriptors restricted to an allow-list; an empty list means all.
    pub fn definitions_for(&self, allowed: &[String]) -> Vec<ToolDefinition> {
        if allowed.is_empty() {
            return self.definitions();
        }
        self.factories
            .iter()
            .filter(|(name, _)| allowed.contains(*name))
            .map(|(_, f)| f().to_definition())
            .collect()
    }

    /// Execute a single call. Never returns `Err`: every failure mode is
    /// encoded in the `ToolResult` so the loop can feed it back to the LLM.
    pub async fn execute_one(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        let Some(factory) = self.factories.get(&call.name) else {
            return ToolResult::failure(
                call,
                ToolErrorKind::ExecutionError,
                format!("unknown tool '{}'", call.name),
            );
        };
        let tool = factory();

        let arguments = call.parsed_arguments();
        if let Err(reason) = schema::validate_args(&tool.parameters(), &arguments) {
            debug!(tool = %call.name, %reason, "Rejecting tool call arguments");
            return ToolResult::failure(call, ToolErrorKind::Validation, reason);
        }

        let ctx = ToolContext {
            cancel: cancel.clone(),
        };
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ToolError::Cancelled {
                tool_name: call.name.clone(),
            }),
            result = tokio::time::timeout(self.tool_timeout, tool.execute(&ctx, arguments)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout_secs: self.tool_timeout.as_secs(),
                    }),
                }
            }
        };

        match outcome {
            Ok(output) => ToolResult::success(call, output),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(call, e.kind(), e.to_string())
            }
        }
    }

    /// Execute a batch of calls concurrently, one worker per call.
    ///
    /// Results come back in input order regardless of completion order.
    /// Cancellation propagates to every in-flight worker.
    pub async fn execute_many(
        self: &Arc<Self>,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        let handles: Vec<_> = calls
            .iter()
            .cloned()
            .map(|call| {
                let registry = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { registry.execute_one(&call, &cancel).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, call) in handles.into_iter().zip(calls) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(ToolResult::failure(
                    call,
                    ToolErrorKind::ExecutionError,
                    format!("tool worker panicked: {e}"),
                )),
            }
        }
        results
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
