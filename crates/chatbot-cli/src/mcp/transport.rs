//! Stdio transport for MCP servers
//!
//! MCP servers run as child processes and speak newline-delimited JSON-RPC
//! 2.0 over their stdin/stdout.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// Child process speaking JSON-RPC on its standard streams
pub struct StdioTransport {
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Child>,
}

impl StdioTransport {
    /// Create a transport from a running process
    pub fn new(mut child: Child) -> Result<Self> {
        let stdin = child
            .stdin
            .take()
            .context("Failed to capture stdin of MCP server")?;
        let stdout = child
            .stdout
            .take()
            .context("Failed to capture stdout of MCP server")?;

        Ok(Self {
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(child),
        })
    }

    /// Spawn a new process and create transport
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {}", command))?;

        debug!(command, pid = ?child.id(), "Spawned MCP server");
        Self::new(child)
    }

    /// Read one line from stdout and parse it as JSON
    async fn read_message(&self) -> Result<Value> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            let read = stdout
                .read_line(&mut line)
                .await
                .context("Failed to read from MCP server")?;

            if read == 0 {
                bail!("MCP server closed connection");
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        trace!(message = %line.trim_end(), "MCP <-");
        serde_json::from_str(&line).context("Failed to parse JSON from MCP server")
    }

    /// Write a message to stdin
    async fn write_message(&self, value: &Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        trace!(message = %json, "MCP ->");

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    /// Send a request and wait for the response carrying its id
    pub async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let request_id = request.id;
        self.write_message(&serde_json::to_value(&request)?).await?;

        loop {
            let message = self.read_message().await?;

            // Server notifications and server-initiated requests carry no
            // response for us; skip them
            if message.get("id").is_none() || message.get("method").is_some() {
                continue;
            }

            let response: JsonRpcResponse =
                serde_json::from_value(message).context("Failed to parse JSON-RPC response")?;

            if response.id == Some(request_id) {
                return Ok(response);
            }
        }
    }

    /// Send a notification (no response expected)
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let mut notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        if let Some(params) = params {
            notification["params"] = params;
        }

        self.write_message(&notification).await
    }

    /// Kill the child process
    pub async fn close(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if child.try_wait()?.is_none() {
            child.kill().await.context("Failed to stop MCP server")?;
        }
        Ok(())
    }
}
