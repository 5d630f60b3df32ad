//! MCP server as a tool provider

use super::client::McpClient;
use super::config::McpServerConfig;
use super::transport::StdioTransport;
use crate::tools::{ToolCallResult, ToolDescriptor, ToolProvider};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// One configured MCP server, started on `initialize` and stopped on `cleanup`
pub struct McpServer {
    config: McpServerConfig,
    client: Mutex<Option<Arc<McpClient>>>,
}

impl McpServer {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        self.client.lock().await.is_some()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn connected(&self) -> Result<Arc<McpClient>> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("MCP server {} is not running", self.config.name))
    }

    /// Like `bounded`, but a timeout also stops `client`.
    ///
    /// An abandoned read may leave half a response in the pipe, so the
    /// connection cannot be reused.
    async fn request<T>(
        &self,
        client: &Arc<McpClient>,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout(self.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                self.discard(client).await;
                bail!(
                    "MCP server {} timed out after {}s during {} and was stopped",
                    self.config.name,
                    self.config.timeout_secs,
                    what
                )
            }
        }
    }

    async fn discard(&self, client: &Arc<McpClient>) {
        {
            let mut slot = self.client.lock().await;
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, client)) {
                *slot = None;
            }
        }
        warn!("Stopping unresponsive MCP server: {}", self.config.name);
        if let Err(e) = client.close().await {
            debug!("Error stopping MCP server {}: {}", self.config.name, e);
        }
    }

    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => bail!(
                "MCP server {} timed out after {}s during {}",
                self.config.name,
                self.config.timeout_secs,
                what
            ),
        }
    }
}

#[async_trait]
impl ToolProvider for McpServer {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn initialize(&self) -> Result<()> {
        let mut slot = self.client.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let name = &self.config.name;
        info!("Starting MCP server: {}", name);

        let mut config = self.config.clone();
        config.expand_env_vars().with_context(|| {
            format!("Failed to expand environment variables for MCP server: {}", name)
        })?;

        let transport = StdioTransport::spawn(
            &config.command,
            &config.args,
            &config.env,
            config.cwd.as_deref(),
        )
        .with_context(|| format!("Failed to start MCP server: {}", name))?;

        let mut client = McpClient::new(transport);
        let handshake = self.bounded("initialization", client.initialize()).await;
        match handshake {
            Ok(result) => {
                info!(
                    "MCP server {} initialized: {} v{}",
                    name,
                    result.server_info.name,
                    result.server_info.version.as_deref().unwrap_or("unknown")
                );
            }
            Err(e) => {
                if let Err(close_err) = client.close().await {
                    debug!("Error stopping MCP server {} after failed start: {}", name, close_err);
                }
                return Err(e.context(format!("Failed to initialize MCP server {}", name)));
            }
        }

        *slot = Some(Arc::new(client));
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let client = self.connected().await?;
        self.request(&client, "tools/list", client.list_tools()).await
    }

    async fn execute_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let client = self.connected().await?;
        debug!(server = %self.config.name, tool = name, "Calling MCP tool");
        self.request(&client, "tools/call", client.call_tool(name, arguments))
            .await
    }

    async fn cleanup(&self) -> Result<()> {
        let Some(client) = self.client.lock().await.take() else {
            return Ok(());
        };

        info!("Stopping MCP server: {}", self.config.name);
        client.close().await.map_err(|e| {
            warn!("Error closing MCP server {}: {}", self.config.name, e);
            e
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const HANDSHAKE_THEN_TOOL: &str = r#"read line
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake"}}}'
read line
read line
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","inputSchema":{"type":"object"}}]}}'
read line
echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"pong"}]}}'
sleep 5"#;

    fn scripted(name: &str, script: &str) -> McpServer {
        McpServer::new(McpServerConfig::new(name, "sh").with_args(["-c", script]))
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let server = scripted("fake", HANDSHAKE_THEN_TOOL);
        assert_eq!(server.name(), "fake");
        assert!(!server.is_running().await);

        server.initialize().await.unwrap();
        assert!(server.is_running().await);

        let tools = server.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");

        let result = server.execute_tool("echo", serde_json::json!({})).await.unwrap();
        assert_eq!(result.first_text(), Some("pong"));

        server.cleanup().await.unwrap();
        assert!(!server.is_running().await);
        server.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_calls_before_initialize_fail() {
        let server = scripted("idle", HANDSHAKE_THEN_TOOL);
        let err = server.list_tools().await.unwrap_err();
        assert!(err.to_string().contains("not running"));
        server.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_timeout_stops_server() {
        let script = r#"read line
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"slow"}}}'
read line
read line
printf '{"jsonrpc":"2.0","id":2,'
sleep 30"#;
        let server = McpServer::new(
            McpServerConfig::new("slow", "sh")
                .with_args(["-c", script])
                .with_timeout_secs(1),
        );
        server.initialize().await.unwrap();

        let err = server.list_tools().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(!server.is_running().await);

        let err = server.execute_tool("echo", serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("not running"));

        server.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_times_out() {
        let server = McpServer::new(
            McpServerConfig::new("silent", "sh")
                .with_args(["-c", "sleep 30"])
                .with_timeout_secs(1),
        );
        let err = server.initialize().await.unwrap_err();
        assert!(format!("{:#}", err).contains("timed out"));
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let server = McpServer::new(McpServerConfig::new("ghost", "/nonexistent/mcp-server"));
        let err = server.initialize().await.unwrap_err();
        assert!(format!("{:#}", err).contains("ghost"));
    }

    #[tokio::test]
    async fn test_unset_env_var_fails_initialize() {
        let server = McpServer::new(
            McpServerConfig::new("needs-env", "sh")
                .with_args(["-c", "sleep 30"])
                .with_env("TOKEN", "${CHATBOT_TEST_UNSET_TOKEN}"),
        );
        let err = server.initialize().await.unwrap_err();
        assert!(format!("{:#}", err).contains("CHATBOT_TEST_UNSET_TOKEN"));
    }
}
