//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of deltas. The agent
//! loop calls `chat()` or `chat_stream()` without knowing which provider is
//! being used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// A chat request sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Tool selection policy
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Provider-specific extra request fields, merged into the wire body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_body: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream: false,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            extra_body: None,
        }
    }
}

/// Whether and which tools the model may call on this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Function(String),
}

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Response candidates; the loop only ever uses the first
    pub choices: Vec<ChatChoice>,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// The first choice, which every known provider populates.
    pub fn primary(&self) -> Option<&ChatChoice> {
        self.choices.first()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: Message,

    /// End-of-turn classification: "stop", "length", "tool_calls", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Fold another usage report into this one.
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A fragment of a tool call arriving on the streaming path.
///
/// Any subset of the fields may be present; the agent's delta merger
/// assembles fragments into complete calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// A raw fragment of the JSON arguments text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    /// Partial content delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool call deltas
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_deltas: Vec<ToolCallDelta>,

    /// Provider-reported finish reason, when the turn ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

/// The core Provider trait.
///
/// Every LLM backend implements `chat`; `chat_stream` has a default
/// implementation that wraps the blocking call in a single chunk, so
/// non-streaming backends still work with `query_stream`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn chat(&self, request: ChatRequest)
    -> std::result::Result<ChatResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChatStreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.chat(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        if let Some(choice) = response.choices.into_iter().next() {
            let deltas = choice
                .message
                .tool_calls
                .iter()
                .map(|tc| ToolCallDelta {
                    id: Some(tc.id.clone()),
                    call_type: Some("function".into()),
                    name: Some(tc.name.clone()),
                    arguments: Some(tc.arguments.clone()),
                })
                .collect();
            let _ = tx
                .send(Ok(ChatStreamChunk {
                    content: choice.message.content.clone(),
                    tool_call_deltas: deltas,
                    finish_reason: choice.finish_reason,
                    usage: response.usage,
                    done: true,
                }))
                .await;
        }
        Ok(rx)
    }

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    #[test]
    fn request_defaults() {
        let req = ChatRequest::new("gpt-4o", vec![]);
        assert!(!req.stream);
        assert_eq!(req.tool_choice, ToolChoice::Auto);
        assert!(req.extra_body.is_none());
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.accumulate(&Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.accumulate(&Usage {
            prompt_tokens: 7,
            completion_tokens: 3,
            total_tokens: 10,
        });
        assert_eq!(total.prompt_tokens, 17);
        assert_eq!(total.total_tokens, 25);
    }

    #[tokio::test]
    async fn default_stream_wraps_blocking_chat() {
        struct FixedProvider;

        #[async_trait]
        impl Provider for FixedProvider {
            fn name(&self) -> &str {
                "fixed"
            }
            async fn chat(
                &self,
                _request: ChatRequest,
            ) -> std::result::Result<ChatResponse, ProviderError> {
                let mut message = Message::assistant("done");
                message.tool_calls = vec![ToolCall::new("c1", "echo", "{}")];
                Ok(ChatResponse {
                    model: "fixed-model".into(),
                    choices: vec![ChatChoice {
                        message,
                        finish_reason: Some("tool_calls".into()),
                    }],
                    usage: None,
                })
            }
        }

        let mut rx = FixedProvider
            .chat_stream(ChatRequest::new("fixed-model", vec![]))
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.content.as_deref(), Some("done"));
        assert_eq!(chunk.tool_call_deltas.len(), 1);
        assert_eq!(chunk.tool_call_deltas[0].name.as_deref(), Some("echo"));
        assert!(rx.recv().await.is_none());
    }
}
