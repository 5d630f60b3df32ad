//! Chat session: provider start-up, the interactive loop and shutdown
//!
//! A session owns the provider set for its whole lifetime. Callers must run
//! `shutdown` on every exit path so MCP server processes are stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use llm_core::CompletionClient;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use crate::agent::{AgentConfig, AgentLoop, Conversation, TurnOutcome};
use crate::events::EventSink;
use crate::tools::registry::{duplicate_names, ProviderSet};
use crate::tools::router::ToolRouter;
use crate::tools::ToolDescriptor;

// ANSI colors
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    ShowMessages,
    Blank,
    Message(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            Input::Blank
        } else if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            Input::Quit
        } else if line == "/messages" {
            Input::ShowMessages
        } else {
            Input::Message(line.to_string())
        }
    }
}

/// A running conversation with initialized tool providers
pub struct ChatSession {
    providers: Arc<ProviderSet>,
    agent: AgentLoop,
    conversation: Conversation,
    tools: Vec<ToolDescriptor>,
}

impl ChatSession {
    /// Initialize every provider and collect their tools.
    ///
    /// Any provider failure aborts start-up; by then all providers have
    /// already been cleaned up.
    pub async fn start(
        client: Arc<dyn CompletionClient>,
        providers: ProviderSet,
        config: AgentConfig,
        system_prompt: String,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let providers = Arc::new(providers);
        providers.initialize_all().await?;

        let tools = match providers.all_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                providers.cleanup_all().await;
                return Err(e).context("Failed to collect tools from providers");
            }
        };

        for name in duplicate_names(&tools) {
            warn!(tool = %name, "Tool name offered by several servers; the first one wins");
        }
        let router = ToolRouter::new(providers.clone(), sink.clone());
        let agent = AgentLoop::new(client, router, config, sink);
        info!(
            providers = providers.len(),
            tools = tools.len(),
            max_rounds = agent.config().max_rounds,
            "Session ready"
        );

        Ok(Self {
            providers,
            agent,
            conversation: Conversation::new(system_prompt),
            tools,
        })
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run one user turn to completion
    pub async fn ask(&mut self, input: &str) -> TurnOutcome {
        self.agent
            .run_turn(&mut self.conversation, input, &self.tools)
            .await
    }

    /// Read lines until the user quits or closes the input.
    ///
    /// `interrupted` is checked between turns; a request already in flight
    /// always runs to completion.
    pub async fn run_interactive(&mut self, interrupted: &AtomicBool) -> Result<()> {
        let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;
        print_welcome(self.tools.len());

        loop {
            let prompt = format!("{}You:{} ", CYAN, RESET);
            let line = match editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!("{}Goodbye!{}", DIM, RESET);
                    break;
                }
                Err(e) => return Err(e).context("Failed to read input"),
            };

            match Input::parse(&line) {
                Input::Blank => continue,
                Input::Quit => {
                    println!("{}Goodbye!{}", DIM, RESET);
                    break;
                }
                Input::ShowMessages => {
                    let transcript = self.conversation.render();
                    info!("Conversation transcript:\n{}", transcript);
                    println!("{}", transcript);
                }
                Input::Message(message) => {
                    let _ = editor.add_history_entry(message.as_str());
                    let outcome = self.ask(&message).await;
                    print_outcome(&outcome);
                }
            }

            if interrupted.load(Ordering::SeqCst) {
                println!("{}Interrupted{}", DIM, RESET);
                break;
            }
        }

        Ok(())
    }

    /// Release every provider; failures are logged, never returned
    pub async fn shutdown(&self) {
        let failures = self.providers.cleanup_all().await;
        if failures.is_empty() {
            info!("All tool providers stopped");
        } else {
            warn!(failed = failures.len(), "Some tool providers did not stop cleanly");
        }
    }
}

fn print_welcome(tool_count: usize) {
    println!();
    println!("{}MCP chatbot{} {}({} tools available){}", BOLD, RESET, DIM, tool_count, RESET);
    println!("{}Type 'quit' or 'exit' to leave, '/messages' to show the conversation{}", DIM, RESET);
    println!();
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Answered { answer, .. } => {
            println!("{}Assistant:{} {}", GREEN, RESET, answer);
        }
        TurnOutcome::LoopExceeded { message, .. } => {
            println!("{}Assistant:{} {}", YELLOW, RESET, message);
        }
    }
    println!();
}

/// Print tool names and descriptions, one per line
pub fn print_tools(tools: &[ToolDescriptor]) {
    if tools.is_empty() {
        println!("No tools available");
        return;
    }

    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for tool in tools {
        println!("  {}{:width$}{}  {}", CYAN, tool.name, RESET, tool.description, width = width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::tools::testing::FakeProvider;
    use async_trait::async_trait;
    use llm_core::{ChatMessage, ToolCall, ToolDefinition};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ReplayClient {
        replies: Mutex<VecDeque<ChatMessage>>,
    }

    impl ReplayClient {
        fn new(replies: Vec<ChatMessage>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ReplayClient {
        async fn complete(&self, _messages: &[ChatMessage], _tools: &[ToolDefinition]) -> ChatMessage {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| ChatMessage::assistant("done"))
        }
    }

    fn set_of(providers: &[Arc<FakeProvider>]) -> ProviderSet {
        let mut set = ProviderSet::new();
        for provider in providers {
            set.register(provider.clone());
        }
        set
    }

    #[test]
    fn test_input_parse() {
        assert_eq!(Input::parse("   "), Input::Blank);
        assert_eq!(Input::parse("QUIT"), Input::Quit);
        assert_eq!(Input::parse(" Exit "), Input::Quit);
        assert_eq!(Input::parse("/messages"), Input::ShowMessages);
        assert_eq!(
            Input::parse("  what is the weather?  "),
            Input::Message("what is the weather?".to_string())
        );
        assert_eq!(Input::parse("quit now"), Input::Message("quit now".to_string()));
    }

    #[tokio::test]
    async fn test_start_ask_and_shutdown() {
        let search = Arc::new(FakeProvider::new("search").with_tool("search", "3 results"));
        let fetch = Arc::new(FakeProvider::new("fetch").with_tool("fetch", "page body"));
        let client = ReplayClient::new(vec![
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("call_1", "search", r#"{"q":"rust"}"#)],
            ),
            ChatMessage::assistant("Rust is a systems language."),
        ]);

        let mut session = ChatSession::start(
            client,
            set_of(&[search.clone(), fetch.clone()]),
            AgentConfig::default(),
            "be brief".to_string(),
            Arc::new(MemorySink::new()),
        )
        .await
        .unwrap();

        let names: Vec<_> = session.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["search", "fetch"]);

        let outcome = session.ask("tell me about rust").await;
        assert_eq!(outcome.final_message(), "Rust is a systems language.");
        assert_eq!(search.call_count(), 1);
        assert_eq!(session.conversation().len(), 5);
        assert!(session.conversation().is_consistent());

        session.shutdown().await;
        assert_eq!(search.cleanups(), 1);
        assert_eq!(fetch.cleanups(), 1);
    }

    #[tokio::test]
    async fn test_start_aborts_when_a_provider_fails() {
        let good = Arc::new(FakeProvider::new("good").with_tool("search", "ok"));
        let mut bad = FakeProvider::new("bad");
        bad.fail_initialize = true;
        let bad = Arc::new(bad);

        let result = ChatSession::start(
            ReplayClient::new(Vec::new()),
            set_of(&[good.clone(), bad.clone()]),
            AgentConfig::default(),
            "system".to_string(),
            Arc::new(MemorySink::new()),
        )
        .await;

        let err = result.err().unwrap();
        assert!(format!("{:#}", err).contains("bad"));
        assert_eq!(good.cleanups(), 1);
        assert_eq!(bad.cleanups(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_survives_cleanup_failure() {
        let mut flaky = FakeProvider::new("flaky");
        flaky.fail_cleanup = true;
        let flaky = Arc::new(flaky);
        let steady = Arc::new(FakeProvider::new("steady"));

        let session = ChatSession::start(
            ReplayClient::new(Vec::new()),
            set_of(&[flaky.clone(), steady.clone()]),
            AgentConfig::default(),
            "system".to_string(),
            Arc::new(MemorySink::new()),
        )
        .await
        .unwrap();

        session.shutdown().await;
        assert_eq!(flaky.cleanups(), 1);
        assert_eq!(steady.cleanups(), 1);
    }
}
