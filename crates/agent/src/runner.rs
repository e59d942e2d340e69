//! The agent loop: blocking `query` and streaming `query_stream`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ferrite_core::error::{AgentError, ProviderError};
use ferrite_core::memory::{ConversationMemory, DEFAULT_MEMORY_SIZE};
use ferrite_core::message::{Message, Role};
use ferrite_core::progress::{ProgressEvent, ProgressHandler};
use ferrite_core::provider::{ChatRequest, Provider, ToolChoice, ToolDefinition, Usage};
use ferrite_core::tool::{ToolErrorKind, ToolRegistry, ToolResult};
use ferrite_core::{Result, SessionSink};

use crate::delta::DeltaMerger;
use crate::event::AgentEvent;
use crate::extract::extract_tool_calls;
use crate::normalize::normalize_arguments;
use crate::prompt::augment_system_prompt;

/// Injected when the assistant returns neither tool calls nor text.
const NUDGE_PROMPT: &str = "Please provide your response based on the information gathered.";

/// Per-agent configuration.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// The model to request from the provider
    pub model: String,

    /// Initial system prompt; also mutable at runtime via
    /// [`Agent::set_system_prompt`]
    pub system_prompt: Option<String>,

    /// Hard cap on outer loop turns per query
    pub max_iterations: u32,

    /// Hard cap on cumulative tool calls per query
    pub max_tool_calls: u32,

    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Provider-specific extra request fields
    pub extra_body: Option<serde_json::Value>,

    /// Allow-list of tool names; empty means all registered tools
    pub tools: Vec<String>,

    /// Conversation memory capacity in messages
    pub memory_size: usize,

    /// Recognize the channel-tagged markup dialect in assistant text
    pub channel_markup: bool,
}

impl AgentOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            max_iterations: 10,
            max_tool_calls: 25,
            temperature: None,
            top_p: None,
            max_tokens: None,
            extra_body: None,
            tools: Vec::new(),
            memory_size: DEFAULT_MEMORY_SIZE,
            channel_markup: false,
        }
    }
}

/// The outcome of a blocking [`Agent::query`].
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The final assistant text
    pub content: String,

    /// Every tool result produced along the way, in execution order
    pub tool_results: Vec<ToolResult>,

    /// Token usage accumulated across all provider calls
    pub usage: Usage,

    /// The provider's finish reason for the final turn
    pub finish_reason: Option<String>,
}

/// Why the streaming worker stopped before completion.
enum StreamAbort {
    Cancelled,
    Failed(AgentError),
}

/// The agent: provider + tool registry + conversation memory + loop.
///
/// One agent owns one conversation. Operations on memory are thread-safe,
/// but a single logical query must not run concurrently with another query
/// on the same instance.
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    memory: Arc<ConversationMemory>,
    options: AgentOptions,
    progress: Option<Arc<dyn ProgressHandler>>,
    session: Option<Arc<dyn SessionSink>>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        options: AgentOptions,
    ) -> Self {
        let memory = Arc::new(ConversationMemory::new(options.memory_size));
        let agent = Self {
            provider,
            registry,
            memory,
            options,
            progress: None,
            session: None,
        };
        if let Some(prompt) = agent.options.system_prompt.clone() {
            agent.set_system_prompt(&prompt);
        }
        agent
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = Some(handler);
        self
    }

    /// Attach a session sink; snapshots are saved after each successful query.
    pub fn with_session(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.session = Some(sink);
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Update the pinned system prompt, augmented with the available-tools
    /// listing for the active tool set.
    pub fn set_system_prompt(&self, text: &str) {
        let mut tools = self.registry.descriptions();
        if !self.options.tools.is_empty() {
            tools.retain(|(name, _)| self.options.tools.contains(name));
        }
        self.memory
            .set_system_prompt(augment_system_prompt(text, &tools));
    }

    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress {
            handler.on_progress(&event);
        }
    }

    /// Build the provider request from a fresh memory snapshot.
    ///
    /// Compatibility fix: assistant turns that carry tool calls but no
    /// content get explicit empty-string content, because some providers
    /// reject absent content on such turns.
    fn build_request(&self, tools: &[ToolDefinition], stream: bool, no_tools: bool) -> ChatRequest {
        let mut messages = self.memory.snapshot();
        for message in &mut messages {
            if message.role == Role::Assistant
                && message.has_tool_calls()
                && message.content.is_none()
            {
                message.content = Some(String::new());
            }
        }

        let mut request = ChatRequest::new(self.options.model.clone(), messages);
        request.temperature = self.options.temperature;
        request.top_p = self.options.top_p;
        request.max_tokens = self.options.max_tokens;
        request.extra_body = self.options.extra_body.clone();
        request.stream = stream;
        request.tools = tools.to_vec();
        request.tool_choice = if no_tools {
            ToolChoice::None
        } else {
            ToolChoice::Auto
        };
        request
    }

    /// Reconcile the assistant turn into canonical form: run the
    /// content-embedded parser when no structured calls arrived, apply the
    /// empty-content compatibility fix, and normalize every call's
    /// arguments.
    fn canonicalize_assistant(&self, assistant: &mut Message) {
        if assistant.tool_calls.is_empty() && !assistant.text().trim().is_empty() {
            let parsed = extract_tool_calls(assistant.text(), self.options.channel_markup);
            if !parsed.is_empty() {
                debug!(count = parsed.len(), "Extracted tool calls from assistant text");
                assistant.tool_calls = parsed;
                assistant.content = None;
            }
        }
        if assistant.has_tool_calls() && assistant.content.is_none() {
            assistant.content = Some(String::new());
        }
        for call in &mut assistant.tool_calls {
            let (_, canonical) = normalize_arguments(&call.arguments);
            call.arguments = canonical;
        }
    }

    async fn save_session(&self) {
        if let Some(sink) = &self.session {
            let snapshot = self.memory.snapshot();
            if let Err(e) = sink.save(&snapshot).await {
                warn!("Failed to save session: {e}");
            }
        }
    }

    /// Process a user question and block until the final answer.
    ///
    /// Provider failures and bound violations abort the loop; individual
    /// tool failures are fed back to the model as `tool` messages instead.
    pub async fn query(&self, input: &str, cancel: CancellationToken) -> Result<AgentResponse> {
        info!(chars = input.len(), "Processing query");
        self.memory.append(Message::user(input));

        let tools = self.registry.definitions_for(&self.options.tools);
        let mut usage = Usage::default();
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut total_tool_calls: u32 = 0;
        let mut force_no_tools = false;

        for iteration in 1..=self.options.max_iterations {
            self.emit_progress(ProgressEvent::Iteration {
                current: iteration,
                max: self.options.max_iterations,
            });

            let request = self.build_request(&tools, false, force_no_tools);
            force_no_tools = false;

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.provider.chat(request) => result?,
            };
            if let Some(u) = &response.usage {
                usage.accumulate(u);
            }

            let Some(choice) = response.choices.into_iter().next() else {
                return Err(AgentError::Provider(ProviderError::ApiError {
                    status_code: 200,
                    message: "no choices in response".into(),
                }));
            };
            let finish_reason = choice.finish_reason;
            let mut assistant = choice.message;
            assistant.role = Role::Assistant;
            self.canonicalize_assistant(&mut assistant);

            let calls = assistant.tool_calls.clone();
            let answer = assistant.text().trim().to_string();
            self.memory.append(assistant);

            if !calls.is_empty() {
                let batch = calls.len() as u32;
                if total_tool_calls + batch > self.options.max_tool_calls {
                    return Err(AgentError::MaxToolCallsExceeded(self.options.max_tool_calls));
                }
                total_tool_calls += batch;

                self.emit_progress(ProgressEvent::ToolCallsStart { count: calls.len() });
                for call in &calls {
                    self.emit_progress(ProgressEvent::ToolCall {
                        name: call.name.clone(),
                    });
                }

                let results = self.registry.execute_many(&calls, &cancel).await;
                for result in &results {
                    self.memory
                        .append(Message::tool_response(&result.call_id, result.render()));
                }
                tool_results.extend(results);
                continue;
            }

            if answer.is_empty() {
                // Empty-content stall: nudge the model toward a plain
                // answer and forbid tools on the next turn.
                debug!(iteration, "Assistant returned no content and no tool calls");
                self.memory.append(Message::user(NUDGE_PROMPT));
                force_no_tools = true;
                self.emit_progress(ProgressEvent::NoTools);
                continue;
            }

            self.save_session().await;
            return Ok(AgentResponse {
                content: answer,
                tool_results,
                usage,
                finish_reason,
            });
        }

        Err(AgentError::MaxIterationsExceeded(self.options.max_iterations))
    }

    /// Process a user question as an event stream.
    ///
    /// The returned channel yields `message_chunk` and tool events, then
    /// exactly one of `complete` or `error` — or closes without either when
    /// the query is cancelled externally. On any termination other than
    /// `complete`, memory is rolled back to its pre-invocation length, so
    /// cancelled queries never pollute history.
    pub fn query_stream(
        self: &Arc<Self>,
        input: &str,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(64);
        let agent = Arc::clone(self);
        let input = input.to_string();

        tokio::spawn(async move {
            let initial_len = agent.memory.len();
            match agent.run_stream(&input, &tx, &cancel).await {
                Ok(()) => {
                    if send_event(&tx, &cancel, AgentEvent::Complete).await {
                        agent.save_session().await;
                    } else {
                        agent.memory.truncate(initial_len);
                    }
                }
                Err(StreamAbort::Cancelled) => {
                    debug!("Streaming query cancelled; rolling back memory");
                    agent.memory.truncate(initial_len);
                }
                Err(StreamAbort::Failed(error)) => {
                    warn!(%error, "Streaming query failed; rolling back memory");
                    let _ = send_event(
                        &tx,
                        &cancel,
                        AgentEvent::Error {
                            message: error.to_string(),
                        },
                    )
                    .await;
                    agent.memory.truncate(initial_len);
                }
            }
        });

        rx
    }

    async fn run_stream(
        &self,
        input: &str,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), StreamAbort> {
        self.memory.append(Message::user(input));

        let tools = self.registry.definitions_for(&self.options.tools);
        let mut total_tool_calls: u32 = 0;
        let mut force_no_tools = false;

        for iteration in 1..=self.options.max_iterations {
            self.emit_progress(ProgressEvent::Iteration {
                current: iteration,
                max: self.options.max_iterations,
            });

            let request = self.build_request(&tools, true, force_no_tools);
            force_no_tools = false;

            let mut chunks = tokio::select! {
                _ = cancel.cancelled() => return Err(StreamAbort::Cancelled),
                result = self.provider.chat_stream(request) => {
                    result.map_err(|e| StreamAbort::Failed(e.into()))?
                }
            };

            let mut merger = DeltaMerger::new();
            let mut content = String::new();

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => return Err(StreamAbort::Cancelled),
                    chunk = chunks.recv() => chunk,
                };
                let Some(chunk) = next else { break };
                let chunk = chunk.map_err(|e| StreamAbort::Failed(e.into()))?;

                if let Some(text) = &chunk.content
                    && !text.is_empty()
                {
                    content.push_str(text);
                    let event = AgentEvent::MessageChunk {
                        content: text.clone(),
                    };
                    if !send_event(tx, cancel, event).await {
                        return Err(StreamAbort::Cancelled);
                    }
                }
                for delta in &chunk.tool_call_deltas {
                    merger.push(delta);
                }
                if chunk.done {
                    break;
                }
            }

            let mut calls = merger.finish();
            if calls.is_empty() && !content.trim().is_empty() {
                let parsed = extract_tool_calls(&content, self.options.channel_markup);
                if !parsed.is_empty() {
                    calls = parsed;
                    content.clear();
                }
            }

            let assistant_content = if calls.is_empty() {
                (!content.is_empty()).then(|| content.clone())
            } else {
                // Tool-call turns always carry explicit (possibly empty) text.
                Some(content.clone())
            };
            let answer_is_blank = content.trim().is_empty();
            self.memory
                .append(Message::assistant_with_tools(assistant_content, calls.clone()));

            if !calls.is_empty() {
                let batch = calls.len() as u32;
                if total_tool_calls + batch > self.options.max_tool_calls {
                    return Err(StreamAbort::Failed(AgentError::MaxToolCallsExceeded(
                        self.options.max_tool_calls,
                    )));
                }
                total_tool_calls += batch;

                self.emit_progress(ProgressEvent::ToolCallsStart { count: calls.len() });
                for call in &calls {
                    self.emit_progress(ProgressEvent::ToolCall {
                        name: call.name.clone(),
                    });
                    let event = AgentEvent::ToolStart {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.parsed_arguments(),
                        raw_arguments: call.arguments.clone(),
                    };
                    if !send_event(tx, cancel, event).await {
                        return Err(StreamAbort::Cancelled);
                    }
                }

                let results = self.registry.execute_many(&calls, cancel).await;
                for result in &results {
                    self.memory
                        .append(Message::tool_response(&result.call_id, result.render()));
                    if !send_event(tx, cancel, tool_event(result)).await {
                        return Err(StreamAbort::Cancelled);
                    }
                }
                continue;
            }

            if answer_is_blank {
                self.memory.append(Message::user(NUDGE_PROMPT));
                force_no_tools = true;
                self.emit_progress(ProgressEvent::NoTools);
                continue;
            }

            return Ok(());
        }

        Err(StreamAbort::Failed(AgentError::MaxIterationsExceeded(
            self.options.max_iterations,
        )))
    }
}

/// Send an event unless the query has been cancelled or the receiver is
/// gone. Returns false when the stream should shut down.
async fn send_event(
    tx: &mpsc::Sender<AgentEvent>,
    cancel: &CancellationToken,
    event: AgentEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

/// Map a tool result to its streaming event.
///
/// The error kind decides between cancel and timeout; a substring match on
/// the error text covers tools that report those conditions as generic
/// execution failures.
fn tool_event(result: &ToolResult) -> AgentEvent {
    let id = result.call_id.clone();
    let name = result.name.clone();
    let Some(failure) = &result.error else {
        return AgentEvent::ToolResult {
            id,
            name,
            output: result.output.clone(),
        };
    };

    match failure.kind {
        ToolErrorKind::Cancelled => AgentEvent::ToolCancel { id, name },
        ToolErrorKind::Timeout => AgentEvent::ToolTimeout { id, name },
        _ => {
            let message = failure.message.to_lowercase();
            if message.contains("cancel") {
                AgentEvent::ToolCancel { id, name }
            } else if message.contains("deadline") || message.contains("timed out") {
                AgentEvent::ToolTimeout { id, name }
            } else {
                AgentEvent::ToolResult {
                    id,
                    name,
                    output: result.render(),
                }
            }
        }
    }
}
