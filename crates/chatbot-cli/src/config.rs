//! User configuration for the chatbot
//!
//! Configuration file: ~/.config/mcp-chatbot/config.toml (or platform equivalent)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User configuration for the chatbot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSection,
}

/// `[agent]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    /// Completion requests allowed per user turn
    #[serde(default)]
    pub max_rounds: Option<usize>,

    /// File whose contents replace the built-in system prompt
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,

    /// Model name, overriding `LLM_MODEL`
    #[serde(default)]
    pub model: Option<String>,
}

impl AgentSection {
    /// Values from `flags` where set, otherwise from this section
    pub fn overridden_by(&self, flags: AgentSection) -> AgentSection {
        AgentSection {
            max_rounds: flags.max_rounds.or(self.max_rounds),
            system_prompt_file: flags.system_prompt_file.or_else(|| self.system_prompt_file.clone()),
            model: flags.model.or_else(|| self.model.clone()),
        }
    }
}

impl UserConfig {
    /// Load user configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the configuration file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mcp-chatbot").join("config.toml"))
    }
}
