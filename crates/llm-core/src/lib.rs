//! llm-core: language-model side of the chatbot
//!
//! Provides:
//! - Configuration from environment variables and `.env`
//! - Chat transcript wire types (messages, tool calls, function envelopes)
//! - The `CompletionClient` contract and its HTTP implementation

pub mod chat;
pub mod client;
pub mod config;

pub use chat::{
    ChatMessage, CompletionClient, FunctionCall, FunctionDefinition, Role, ToolCall, ToolDefinition,
};
pub use client::ChatClient;
pub use config::{ChatOptions, Config, LlmSource};
