//! MCP server list parsing
//!
//! Servers are listed in a JSON file:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "search": { "command": "npx", "args": ["-y", "some-search-server"],
//!                 "env": { "API_KEY": "${SEARCH_API_KEY}" } }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Configuration for an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique name for this server (taken from the map key)
    #[serde(skip)]
    pub name: String,
    /// Command to run the server
    pub command: String,
    /// Arguments to pass to the command
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables (supports ${VAR} expansion)
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Timeout for each request to the server in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl McpServerConfig {
    /// Create a new server config with just name and command
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Add arguments
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Expand environment variables in config values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        for value in self.env.values_mut() {
            *value = expand_env_string(value)?;
        }
        Ok(())
    }
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

/// Expand ${VAR} patterns in a string using environment variables
pub fn expand_env_string(s: &str) -> Result<String> {
    let mut result = s.to_string();

    for cap in env_var_pattern().captures_iter(s) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name)
            .with_context(|| format!("Environment variable {} not set", var_name))?;
        result = result.replace(&cap[0], &var_value);
    }

    Ok(result)
}

#[derive(Debug, Deserialize)]
struct ServersFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: serde_json::Map<String, serde_json::Value>,
}

/// Parse the server list, keeping the order servers appear in the file
pub fn parse_servers_json(json: &str) -> Result<Vec<McpServerConfig>> {
    let file: ServersFile = serde_json::from_str(json).context("Failed to parse server list JSON")?;

    file.mcp_servers
        .into_iter()
        .map(|(name, value)| {
            let mut config: McpServerConfig = serde_json::from_value(value)
                .with_context(|| format!("Invalid configuration for server {}", name))?;
            config.name = name;
            Ok(config)
        })
        .collect()
}

/// Load the server list from `path`; no path means no servers
pub fn load_servers(path: Option<&Path>) -> Result<Vec<McpServerConfig>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read server list from {}", path.display()))?;

    parse_servers_json(&content).with_context(|| format!("Failed to load {}", path.display()))
}
