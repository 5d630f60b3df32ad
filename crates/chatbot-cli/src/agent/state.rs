//! Agent configuration and conversation state

use std::collections::HashSet;

use llm_core::{ChatMessage, Role, ToolCall};

/// Default cap on completion requests within one turn
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum completion requests per user turn
    pub max_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl AgentConfig {
    /// At least one round is always allowed
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max.max(1);
        self
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model produced a final answer
    Answered { answer: String, rounds: usize },
    /// The model kept requesting tools until the round limit
    LoopExceeded { rounds: usize, message: String },
}

impl TurnOutcome {
    /// The assistant text that closed the turn
    pub fn final_message(&self) -> &str {
        match self {
            TurnOutcome::Answered { answer, .. } => answer,
            TurnOutcome::LoopExceeded { message, .. } => message,
        }
    }

    pub fn rounds(&self) -> usize {
        match self {
            TurnOutcome::Answered { rounds, .. } | TurnOutcome::LoopExceeded { rounds, .. } => {
                *rounds
            }
        }
    }
}

/// Append-only transcript of one chat session.
///
/// The first message is always the system prompt.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn push_tool_calls(&mut self, content: impl Into<String>, calls: Vec<ToolCall>) {
        self.messages
            .push(ChatMessage::assistant_with_tool_calls(content, calls));
    }

    pub fn push_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.messages
            .push(ChatMessage::tool_result(tool_call_id, content));
    }

    /// Every tool message answers a call id issued earlier by the assistant
    pub fn is_consistent(&self) -> bool {
        if self.messages.first().map(|m| m.role) != Some(Role::System) {
            return false;
        }

        let mut issued: HashSet<&str> = HashSet::new();
        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    issued.extend(message.requested_tool_calls().iter().map(|c| c.id.as_str()));
                }
                Role::Tool => match message.tool_call_id.as_deref() {
                    Some(id) if issued.contains(id) => {}
                    _ => return false,
                },
                _ => {}
            }
        }
        true
    }

    /// Human-readable dump of the transcript
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, message) in self.messages.iter().enumerate() {
            out.push_str(&format!("[{}] {}", i, message.role));
            if let Some(id) = &message.tool_call_id {
                out.push_str(&format!(" ({})", id));
            }
            out.push_str(": ");
            out.push_str(&message.content);
            for call in message.requested_tool_calls() {
                out.push_str(&format!(
                    "\n    -> {} {} {}",
                    call.id, call.function.name, call.function.arguments
                ));
            }
            out.push('\n');
        }
        out
    }
}
