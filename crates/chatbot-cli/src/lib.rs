//! chatbot-cli: terminal chatbot whose model drives tools served by MCP servers
//!
//! Provides:
//! - The agent loop and its conversation state
//! - Tool routing across an ordered set of providers
//! - MCP servers as tool providers
//! - The interactive session used by the `chatbot` binary

pub mod agent;
pub mod config;
pub mod events;
pub mod mcp;
pub mod session;
pub mod tools;
