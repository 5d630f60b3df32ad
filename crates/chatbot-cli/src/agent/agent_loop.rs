//! Agent loop implementation

use std::sync::Arc;

use llm_core::{ChatMessage, CompletionClient, ToolCall, ToolDefinition};
use tracing::Level;

use crate::events::EventSink;
use crate::tools::router::ToolRouter;
use crate::tools::ToolDescriptor;

use super::state::{AgentConfig, Conversation, TurnOutcome};

/// The agent loop orchestrator
pub struct AgentLoop {
    client: Arc<dyn CompletionClient>,
    router: ToolRouter,
    config: AgentConfig,
    sink: Arc<dyn EventSink>,
}

impl AgentLoop {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        router: ToolRouter,
        config: AgentConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            client,
            router,
            config,
            sink,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Append the user's message and drive the turn to completion
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_input: &str,
        tools: &[ToolDescriptor],
    ) -> TurnOutcome {
        conversation.push_user(user_input);
        self.process_turn(conversation, tools).await
    }

    /// Drive one user turn until the model answers without requesting tools.
    ///
    /// Each round is one completion request. Requested tools run one at a
    /// time in the order the model listed them, and every call gets exactly
    /// one tool message. After `max_rounds` requests the turn is closed with
    /// an explanatory assistant message instead.
    pub async fn process_turn(
        &self,
        conversation: &mut Conversation,
        tools: &[ToolDescriptor],
    ) -> TurnOutcome {
        let definitions: Vec<ToolDefinition> = tools.iter().map(ToolDescriptor::to_definition).collect();
        let mut round = 0;

        while round < self.config.max_rounds {
            round += 1;
            self.sink.record(
                Level::DEBUG,
                "completion requested",
                &[
                    ("round", round.to_string()),
                    ("messages", conversation.len().to_string()),
                    ("tools", definitions.len().to_string()),
                ],
            );

            let reply = self.client.complete(conversation.messages(), &definitions).await;

            if !reply.has_tool_calls() {
                self.sink.record(
                    Level::INFO,
                    "assistant answered",
                    &[("round", round.to_string()), ("answer", reply.content.clone())],
                );
                conversation.push_assistant(reply.content.clone());
                return TurnOutcome::Answered {
                    answer: reply.content,
                    rounds: round,
                };
            }

            let ChatMessage {
                content, tool_calls, ..
            } = reply;
            let calls = with_call_ids(tool_calls.unwrap_or_default());

            self.sink.record(
                Level::INFO,
                "assistant requested tools",
                &[
                    ("round", round.to_string()),
                    ("count", calls.len().to_string()),
                    (
                        "tools",
                        calls.iter().map(|c| c.name()).collect::<Vec<_>>().join(","),
                    ),
                ],
            );
            conversation.push_tool_calls(content, calls.clone());

            for call in &calls {
                let result = self.router.dispatch(call).await;
                self.sink.record(
                    Level::INFO,
                    "tool result",
                    &[
                        ("tool", call.name().to_string()),
                        ("call_id", call.id.clone()),
                        ("result", result.clone()),
                    ],
                );
                conversation.push_tool_result(call.id.clone(), result);
            }
        }

        let message = format!(
            "I stopped after {} rounds of tool use without reaching a final answer. \
             Please narrow down the request or try again.",
            round
        );
        self.sink.record(
            Level::WARN,
            "tool loop exceeded",
            &[("rounds", round.to_string())],
        );
        conversation.push_assistant(message.clone());
        TurnOutcome::LoopExceeded {
            rounds: round,
            message,
        }
    }
}

/// Give every call a correlation id so its tool message can reference it
fn with_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.trim().is_empty() {
                call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
            }
            call
        })
        .collect()
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("router", &self.router)
            .field("config", &self.config)
            .finish()
    }
}
