//! MCP client
//!
//! Speaks the subset of the Model Context Protocol the chatbot needs:
//! the initialize handshake, tool listing and tool calls.

use super::transport::{JsonRpcRequest, StdioTransport};
use crate::tools::{ToolCallResult, ToolDescriptor};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// MCP protocol version
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Client info sent during initialization
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcp-chatbot".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Server capabilities returned during initialization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

/// Server info returned during initialization
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

/// Tool as advertised on the wire; description may be absent
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpToolInfo {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Value,
}

impl From<McpToolInfo> for ToolDescriptor {
    fn from(info: McpToolInfo) -> Self {
        ToolDescriptor::new(info.name, info.description.unwrap_or_default(), info.input_schema)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    tools: Vec<McpToolInfo>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Client for one MCP server
pub struct McpClient {
    transport: StdioTransport,
    request_id: AtomicU64,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    pub fn new(transport: StdioTransport) -> Self {
        Self {
            transport,
            request_id: AtomicU64::new(1),
            server_info: None,
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and decode its result
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        let response = self.transport.send_request(request).await?;

        if let Some(error) = response.error {
            bail!("MCP error: {}", error);
        }

        let result = response.result.context("MCP response missing result")?;
        serde_json::from_value(result).context("Failed to parse MCP result")
    }

    /// Run the initialize handshake
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": ClientInfo::default()
        });

        let result: InitializeResult = self
            .request("initialize", Some(params))
            .await
            .context("Failed to initialize MCP connection")?;

        self.transport
            .send_notification("notifications/initialized", None)
            .await?;

        self.server_info = Some(result.server_info.clone());
        Ok(result)
    }

    pub fn is_initialized(&self) -> bool {
        self.server_info.is_some()
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// List every tool, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        if !self.is_initialized() {
            bail!("MCP client not initialized");
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));

            let result: ListToolsResult = self
                .request("tools/list", params)
                .await
                .context("Failed to list MCP tools")?;

            tools.extend(result.tools.into_iter().map(ToolDescriptor::from));

            match result.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        if !self.is_initialized() {
            bail!("MCP client not initialized");
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        self.request("tools/call", Some(params))
            .await
            .with_context(|| format!("Failed to call MCP tool: {}", name))
    }

    /// Stop the server process
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }
}
