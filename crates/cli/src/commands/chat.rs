//! Interactive chat and single-message mode, both on the streaming path.

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ferrite_agent::{Agent, AgentEvent, AgentOptions};
use ferrite_config::AppConfig;
use ferrite_core::progress::{ProgressEvent, ProgressHandler};
use ferrite_core::SessionSink;
use ferrite_session::FileSessionStore;

/// Logs loop progress at debug level.
struct LogProgress;

impl ProgressHandler for LogProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Iteration { current, max } => {
                debug!(current, max, "agent iteration")
            }
            ProgressEvent::ToolCallsStart { count } => debug!(count, "tool batch"),
            ProgressEvent::ToolCall { name } => debug!(%name, "tool call"),
            ProgressEvent::NoTools => debug!("nudging model toward a text answer"),
        }
    }
}

pub async fn run(message: Option<String>, resume: bool) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let provider = super::build_provider(&config)?;
    let registry = Arc::new(super::build_registry(&config));

    let mut options = AgentOptions::new(super::resolve_model(&config));
    options.system_prompt = Some(config.agent.system_prompt.clone());
    options.max_iterations = config.agent.max_iterations;
    options.max_tool_calls = config.agent.max_tool_calls;
    options.memory_size = config.agent.memory_size;
    options.channel_markup = config.agent.channel_markup;
    options.temperature = config.temperature;
    options.top_p = config.top_p;
    options.max_tokens = Some(config.max_tokens);
    options.tools = config.tools.enabled.clone();

    let mut agent = Agent::new(provider, registry, options);

    if config.session.enabled {
        let store = Arc::new(FileSessionStore::new(config.session_path()));
        if resume {
            let previous = store.load().await?;
            if !previous.is_empty() {
                println!("(resumed {} messages)", previous.len());
                agent.memory().replace(previous);
                agent.set_system_prompt(&config.agent.system_prompt);
            }
        }
        agent = agent.with_session(store);
    }

    let agent = Arc::new(agent.with_progress(Arc::new(LogProgress)));

    match message {
        Some(message) => {
            stream_one(&agent, &message).await;
            Ok(())
        }
        None => repl(&agent).await,
    }
}

async fn repl(agent: &Arc<Agent>) -> anyhow::Result<()> {
    println!("ferrite — type a question, 'exit' to quit, '/clear' to reset the conversation");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if line == "/clear" {
            agent.memory().clear();
            println!("(conversation cleared)");
            continue;
        }

        stream_one(agent, line).await;
    }
    Ok(())
}

/// Run one streaming query, printing events as they arrive. Ctrl-C cancels
/// the in-flight query without leaving the REPL.
async fn stream_one(agent: &Arc<Agent>, input: &str) {
    let cancel = CancellationToken::new();
    let mut events = agent.query_stream(input, cancel.clone());
    let mut wrote_text = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n(cancelled)");
                cancel.cancel();
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    AgentEvent::MessageChunk { content } => {
                        print!("{content}");
                        std::io::stdout().flush().ok();
                        wrote_text = true;
                    }
                    AgentEvent::ToolStart { name, arguments, .. } => {
                        eprintln!("· running {name} {arguments}");
                    }
                    AgentEvent::ToolResult { name, .. } => {
                        eprintln!("· {name} finished");
                    }
                    AgentEvent::ToolCancel { name, .. } => {
                        eprintln!("· {name} cancelled");
                    }
                    AgentEvent::ToolTimeout { name, .. } => {
                        eprintln!("· {name} timed out");
                    }
                    AgentEvent::Error { message } => {
                        eprintln!("error: {message}");
                    }
                    AgentEvent::Complete => {
                        if wrote_text {
                            println!();
                        }
                    }
                }
            }
        }
    }
}
