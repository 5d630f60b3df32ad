//! MCP (Model Context Protocol) tool providers
//!
//! Each configured server runs as a child process. `McpServer` wraps the
//! process in the `ToolProvider` contract so the agent sees its tools like
//! any other provider's.
//!
//! ```text
//! ProviderSet ─┬─ McpServer (search) ── McpClient ── StdioTransport ── child
//!              └─ McpServer (fetch)  ── McpClient ── StdioTransport ── child
//! ```

pub mod client;
pub mod config;
pub mod server;
pub mod transport;

pub use client::{McpClient, MCP_PROTOCOL_VERSION};
pub use config::{load_servers, parse_servers_json, McpServerConfig};
pub use server::McpServer;
pub use transport::StdioTransport;

use crate::tools::registry::ProviderSet;
use std::sync::Arc;

/// Provider set holding one uninitialized `McpServer` per config, in order
pub fn provider_set(configs: Vec<McpServerConfig>) -> ProviderSet {
    let mut providers = ProviderSet::new();
    for config in configs {
        providers.register(Arc::new(McpServer::new(config)));
    }
    providers
}
