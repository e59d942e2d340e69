//! End-to-end agent loop tests against scripted providers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ferrite_agent::{Agent, AgentEvent, AgentOptions};
use ferrite_core::error::{AgentError, ProviderError, SessionError, ToolError};
use ferrite_core::message::{Message, Role, ToolCall};
use ferrite_core::provider::{
    ChatChoice, ChatRequest, ChatResponse, ChatStreamChunk, Provider, ToolCallDelta, ToolChoice,
    Usage,
};
use ferrite_core::schema::ParamSpec;
use ferrite_core::tool::{Tool, ToolContext, ToolErrorKind, ToolRegistry};
use ferrite_core::SessionSink;

// ── Scripted providers ────────────────────────────────────────────────────

/// Pops one canned response per `chat` call and records every request.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))
    }
}

/// Pops one canned chunk sequence per `chat_stream` call.
struct ScriptedStreamProvider {
    scripts: Mutex<VecDeque<Vec<ChatStreamChunk>>>,
}

impl ScriptedStreamProvider {
    fn new(scripts: Vec<Vec<ChatStreamChunk>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
        })
    }
}

#[async_trait]
impl Provider for ScriptedStreamProvider {
    fn name(&self) -> &str {
        "scripted-stream"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::NotConfigured("stream-only".into()))
    }

    async fn chat_stream(
        &self,
        _request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<ChatStreamChunk, ProviderError>>,
        ProviderError,
    > {
        let chunks = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Emits one content chunk, then keeps the stream open forever.
struct HangingStreamProvider;

#[async_trait]
impl Provider for HangingStreamProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::NotConfigured("stream-only".into()))
    }

    async fn chat_stream(
        &self,
        _request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<ChatStreamChunk, ProviderError>>,
        ProviderError,
    > {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            let _ = tx
                .send(Ok(ChatStreamChunk {
                    content: Some("Thinking".into()),
                    ..Default::default()
                }))
                .await;
            // Hold the sender open so the stream never ends on its own.
            tx.closed().await;
        });
        Ok(rx)
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────

fn assistant_reply(text: &str) -> ChatResponse {
    ChatResponse {
        model: "scripted-model".into(),
        choices: vec![ChatChoice {
            message: Message::assistant(text),
            finish_reason: Some("stop".into()),
        }],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

fn assistant_tool_call(id: &str, name: &str, arguments: &str) -> ChatResponse {
    ChatResponse {
        model: "scripted-model".into(),
        choices: vec![ChatChoice {
            message: Message::assistant_with_tools(
                Some(String::new()),
                vec![ToolCall::new(id, name, arguments)],
            ),
            finish_reason: Some("tool_calls".into()),
        }],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// A calculator stand-in that always answers "5".
struct FixedCalc;

#[async_trait]
impl Tool for FixedCalc {
    fn name(&self) -> &str {
        "calculate"
    }
    fn description(&self) -> &str {
        "Evaluate a mathematical expression"
    }
    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("expression").required()]
    }
    async fn execute(
        &self,
        _ctx: &ToolContext,
        _arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        Ok("5".into())
    }
}

/// Echoes the looked-up article title.
struct FixedWiki;

#[async_trait]
impl Tool for FixedWiki {
    fn name(&self) -> &str {
        "wikipedia"
    }
    fn description(&self) -> &str {
        "Look up an encyclopedia article"
    }
    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("input").required()]
    }
    async fn execute(
        &self,
        _ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        Ok(format!("Article: {}", arguments["input"].as_str().unwrap_or("")))
    }
}

struct FixedBash;

#[async_trait]
impl Tool for FixedBash {
    fn name(&self) -> &str {
        "bash"
    }
    fn description(&self) -> &str {
        "Run a command"
    }
    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("command").required()]
    }
    async fn execute(
        &self,
        _ctx: &ToolContext,
        _arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        Ok("Tue Jan 6 12:00:00 UTC".into())
    }
}

fn standard_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(|| Box::new(FixedCalc) as Box<dyn Tool>).unwrap();
    registry.register(|| Box::new(FixedWiki) as Box<dyn Tool>).unwrap();
    registry.register(|| Box::new(FixedBash) as Box<dyn Tool>).unwrap();
    Arc::new(registry)
}

fn options() -> AgentOptions {
    let mut options = AgentOptions::new("scripted-model");
    options.system_prompt = Some("You are helpful.".into());
    options.max_iterations = 5;
    options.max_tool_calls = 5;
    options
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

// ── Blocking mode ─────────────────────────────────────────────────────────

#[tokio::test]
async fn blocking_happy_path_with_tool_round_trip() {
    let provider = ScriptedProvider::new(vec![
        assistant_tool_call("call_1", "calculate", r#"{"expression":"2+3"}"#),
        assistant_reply("The answer is 5."),
    ]);
    let agent = Agent::new(provider.clone(), standard_registry(), options());

    let response = agent.query("2+3?", CancellationToken::new()).await.unwrap();
    assert_eq!(response.content, "The answer is 5.");
    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(response.tool_results[0].output, "5");
    assert_eq!(response.usage.total_tokens, 30);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));

    // system, user, assistant-with-tool-call, tool, assistant-final
    let memory = agent.memory().snapshot();
    assert_eq!(memory.len(), 5);
    assert_eq!(memory[0].role, Role::System);
    assert!(memory[0].text().contains("Available tools"));
    assert_eq!(memory[1].text(), "2+3?");
    assert!(memory[2].has_tool_calls());
    assert_eq!(memory[3].role, Role::Tool);
    assert_eq!(memory[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(memory[3].text(), "5");
    assert_eq!(memory[4].text(), "The answer is 5.");
}

#[tokio::test]
async fn content_embedded_json_invocation() {
    let embedded = r#"{"name":"wikipedia","arguments":{"input":"Tunguska incident"}}"#;
    let provider = ScriptedProvider::new(vec![
        assistant_reply(embedded),
        assistant_reply("It was an airburst."),
    ]);
    let agent = Agent::new(provider, standard_registry(), options());

    let response = agent
        .query("What happened at Tunguska?", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.content, "It was an airburst.");
    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(response.tool_results[0].name, "wikipedia");
    assert_eq!(response.tool_results[0].output, "Article: Tunguska incident");

    // The parsed assistant turn carries the call and cleared (empty) text.
    let memory = agent.memory().snapshot();
    let turn = &memory[2];
    assert!(turn.has_tool_calls());
    assert_eq!(turn.content.as_deref(), Some(""));
    assert_eq!(turn.tool_calls[0].arguments, r#"{"input":"Tunguska incident"}"#);
    assert!(turn.tool_calls[0].id.starts_with("call_"));
}

#[tokio::test]
async fn invalid_arguments_self_heal() {
    let provider = ScriptedProvider::new(vec![
        assistant_tool_call("call_1", "calculate", "not-json"),
        assistant_reply("I could not compute that."),
    ]);
    let agent = Agent::new(provider, standard_registry(), options());

    let response = agent.query("2+3?", CancellationToken::new()).await.unwrap();
    assert_eq!(response.content, "I could not compute that.");

    // The normalizer coerced the garbage to {}, validation failed, and the
    // error round-tripped as a tool message without aborting the loop.
    let failure = response.tool_results[0].error.as_ref().unwrap();
    assert_eq!(failure.kind, ToolErrorKind::Validation);

    let memory = agent.memory().snapshot();
    assert_eq!(memory[2].tool_calls[0].arguments, "{}");
    assert!(memory[3].text().starts_with("Error (validation):"));
}

#[tokio::test]
async fn empty_content_stall_nudges_and_disables_tools() {
    let provider = ScriptedProvider::new(vec![
        assistant_reply(""),
        assistant_reply("Here is the answer."),
    ]);
    let agent = Agent::new(provider.clone(), standard_registry(), options());

    let response = agent.query("hello", CancellationToken::new()).await.unwrap();
    assert_eq!(response.content, "Here is the answer.");

    let memory = agent.memory().snapshot();
    let nudge = memory
        .iter()
        .find(|m| m.role == Role::User && m.text().contains("based on the information gathered"));
    assert!(nudge.is_some(), "nudge user message should be in memory");

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
    assert_eq!(requests[1].tool_choice, ToolChoice::None);
}

#[tokio::test]
async fn max_iterations_exceeded() {
    let provider = ScriptedProvider::new(vec![
        assistant_tool_call("c1", "calculate", r#"{"expression":"1"}"#),
        assistant_tool_call("c2", "calculate", r#"{"expression":"2"}"#),
    ]);
    let mut opts = options();
    opts.max_iterations = 2;
    let agent = Agent::new(provider, standard_registry(), opts);

    let err = agent.query("loop", CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::MaxIterationsExceeded(2)));
}

#[tokio::test]
async fn max_tool_calls_exceeded_aborts_before_dispatch() {
    let batch = ChatResponse {
        model: "scripted-model".into(),
        choices: vec![ChatChoice {
            message: Message::assistant_with_tools(
                Some(String::new()),
                vec![
                    ToolCall::new("c1", "calculate", r#"{"expression":"1"}"#),
                    ToolCall::new("c2", "calculate", r#"{"expression":"2"}"#),
                ],
            ),
            finish_reason: Some("tool_calls".into()),
        }],
        usage: None,
    };
    let provider = ScriptedProvider::new(vec![batch]);
    let mut opts = options();
    opts.max_tool_calls = 1;
    let agent = Agent::new(provider, standard_registry(), opts);

    let err = agent.query("go", CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::MaxToolCallsExceeded(1)));
}

#[tokio::test]
async fn provider_failure_is_surfaced() {
    let provider = ScriptedProvider::new(vec![]);
    let agent = Agent::new(provider, standard_registry(), options());

    let err = agent.query("hi", CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::Provider(_)));
}

#[tokio::test]
async fn tool_allow_list_restricts_descriptors() {
    let provider = ScriptedProvider::new(vec![assistant_reply("ok")]);
    let mut opts = options();
    opts.tools = vec!["calculate".into()];
    let agent = Agent::new(provider.clone(), standard_registry(), opts);

    agent.query("hi", CancellationToken::new()).await.unwrap();

    let requests = provider.requests.lock().unwrap();
    let names: Vec<_> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["calculate"]);
}

#[tokio::test]
async fn session_sink_receives_snapshot_after_success() {
    struct RecordingSink(Mutex<Vec<usize>>);

    #[async_trait]
    impl SessionSink for RecordingSink {
        async fn save(&self, messages: &[Message]) -> Result<(), SessionError> {
            self.0.lock().unwrap().push(messages.len());
            Ok(())
        }
        async fn load(&self) -> Result<Vec<Message>, SessionError> {
            Ok(Vec::new())
        }
    }

    let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
    let provider = ScriptedProvider::new(vec![assistant_reply("done")]);
    let agent =
        Agent::new(provider, standard_registry(), options()).with_session(sink.clone());

    agent.query("hi", CancellationToken::new()).await.unwrap();

    let saves = sink.0.lock().unwrap();
    // system + user + assistant
    assert_eq!(saves.as_slice(), [3]);
}

// ── Streaming mode ────────────────────────────────────────────────────────

#[tokio::test]
async fn streaming_fragmented_tool_call_and_completion() {
    let round_one = vec![
        ChatStreamChunk {
            tool_call_deltas: vec![ToolCallDelta {
                id: Some("c1".into()),
                call_type: Some("function".into()),
                name: Some("bash".into()),
                arguments: Some("{\"comm".into()),
            }],
            ..Default::default()
        },
        ChatStreamChunk {
            tool_call_deltas: vec![ToolCallDelta {
                arguments: Some("and\":\"date\"}".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
        ChatStreamChunk {
            finish_reason: Some("tool_calls".into()),
            done: true,
            ..Default::default()
        },
    ];
    let round_two = vec![
        ChatStreamChunk {
            content: Some("It is ".into()),
            ..Default::default()
        },
        ChatStreamChunk {
            content: Some("Tuesday.".into()),
            ..Default::default()
        },
        ChatStreamChunk {
            finish_reason: Some("stop".into()),
            done: true,
            ..Default::default()
        },
    ];
    let provider = ScriptedStreamProvider::new(vec![round_one, round_two]);
    let agent = Arc::new(Agent::new(provider, standard_registry(), options()));

    let events = drain(agent.query_stream("what day is it?", CancellationToken::new())).await;

    let mut iter = events.iter();
    match iter.next().unwrap() {
        AgentEvent::ToolStart {
            id,
            name,
            arguments,
            raw_arguments,
        } => {
            assert_eq!(id, "c1");
            assert_eq!(name, "bash");
            assert_eq!(arguments["command"], "date");
            assert_eq!(raw_arguments, r#"{"command":"date"}"#);
        }
        other => panic!("expected ToolStart, got {other:?}"),
    }
    assert!(matches!(iter.next().unwrap(), AgentEvent::ToolResult { .. }));
    assert!(matches!(
        iter.next().unwrap(),
        AgentEvent::MessageChunk { content } if content == "It is "
    ));
    assert!(matches!(
        iter.next().unwrap(),
        AgentEvent::MessageChunk { content } if content == "Tuesday."
    ));
    assert!(matches!(iter.next().unwrap(), AgentEvent::Complete));
    assert!(iter.next().is_none());

    // system, user, assistant-with-tool-call, tool, assistant-final
    let memory = agent.memory().snapshot();
    assert_eq!(memory.len(), 5);
    assert_eq!(memory[4].text(), "It is Tuesday.");
}

#[tokio::test]
async fn streaming_cancellation_rolls_back_memory() {
    let agent = Arc::new(Agent::new(
        Arc::new(HangingStreamProvider),
        standard_registry(),
        options(),
    ));
    let initial_len = agent.memory().len();

    let cancel = CancellationToken::new();
    let mut rx = agent.query_stream("tell me everything", cancel.clone());

    // First chunk arrives, then we cancel mid-stream.
    let first = rx.recv().await.unwrap();
    assert!(matches!(first, AgentEvent::MessageChunk { .. }));
    cancel.cancel();

    let rest = drain(rx).await;
    assert!(
        !rest.iter().any(|e| matches!(e, AgentEvent::Complete)),
        "cancelled stream must not complete"
    );

    // Wait for the worker to roll back.
    tokio::time::timeout(Duration::from_secs(2), async {
        while agent.memory().len() != initial_len {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("memory was not rolled back after cancellation");
}

#[tokio::test]
async fn streaming_max_iterations_emits_error_and_rolls_back() {
    let tool_round = || {
        vec![
            ChatStreamChunk {
                tool_call_deltas: vec![ToolCallDelta {
                    id: Some("c1".into()),
                    name: Some("calculate".into()),
                    arguments: Some(r#"{"expression":"1"}"#.into()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ChatStreamChunk {
                finish_reason: Some("tool_calls".into()),
                done: true,
                ..Default::default()
            },
        ]
    };
    let provider = ScriptedStreamProvider::new(vec![tool_round(), tool_round()]);
    let mut opts = options();
    opts.max_iterations = 2;
    let agent = Arc::new(Agent::new(provider, standard_registry(), opts));
    let initial_len = agent.memory().len();

    let events = drain(agent.query_stream("loop", CancellationToken::new())).await;
    let last = events.last().unwrap();
    assert!(
        matches!(last, AgentEvent::Error { message } if message.contains("iterations")),
        "expected a final error event, got {last:?}"
    );
    assert_eq!(agent.memory().len(), initial_len);
}

#[tokio::test]
async fn streaming_content_embedded_invocation() {
    let embedded = r#"{"name":"calculate","arguments":{"expression":"2+3"}}"#;
    let round_one = vec![
        ChatStreamChunk {
            content: Some(embedded.into()),
            ..Default::default()
        },
        ChatStreamChunk {
            finish_reason: Some("stop".into()),
            done: true,
            ..Default::default()
        },
    ];
    let round_two = vec![
        ChatStreamChunk {
            content: Some("Five.".into()),
            ..Default::default()
        },
        ChatStreamChunk {
            done: true,
            ..Default::default()
        },
    ];
    let provider = ScriptedStreamProvider::new(vec![round_one, round_two]);
    let agent = Arc::new(Agent::new(provider, standard_registry(), options()));

    let events = drain(agent.query_stream("2+3?", CancellationToken::new())).await;
    assert!(events.iter().any(
        |e| matches!(e, AgentEvent::ToolStart { name, .. } if name == "calculate")
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolResult { output, .. } if output == "5")));
    assert!(matches!(events.last().unwrap(), AgentEvent::Complete));
}

#[tokio::test]
async fn streaming_tool_timeout_event() {
    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Sleeps"
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![]
        }
        async fn execute(
            &self,
            _ctx: &ToolContext,
            _arguments: serde_json::Value,
        ) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("done".into())
        }
    }

    let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(20));
    registry.register(|| Box::new(SleepyTool) as Box<dyn Tool>).unwrap();

    let round_one = vec![
        ChatStreamChunk {
            tool_call_deltas: vec![ToolCallDelta {
                id: Some("c1".into()),
                name: Some("sleepy".into()),
                arguments: Some("{}".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
        ChatStreamChunk {
            done: true,
            ..Default::default()
        },
    ];
    let round_two = vec![
        ChatStreamChunk {
            content: Some("The tool was too slow.".into()),
            ..Default::default()
        },
        ChatStreamChunk {
            done: true,
            ..Default::default()
        },
    ];
    let provider = ScriptedStreamProvider::new(vec![round_one, round_two]);
    let agent = Arc::new(Agent::new(provider, Arc::new(registry), options()));

    let events = drain(agent.query_stream("sleep", CancellationToken::new())).await;
    assert!(events.iter().any(
        |e| matches!(e, AgentEvent::ToolTimeout { id, name } if id == "c1" && name == "sleepy")
    ));
    assert!(matches!(events.last().unwrap(), AgentEvent::Complete));

    // The timeout is still round-tripped to the LLM as a tool message.
    let memory = agent.memory().snapshot();
    assert!(memory
        .iter()
        .any(|m| m.role == Role::Tool && m.text().starts_with("Error (timeout)")));
}
