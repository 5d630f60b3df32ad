//! LLM configuration resolved from the environment (and an optional `.env`)

use std::path::PathBuf;
use std::time::Duration;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const OLLAMA_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";
const OLLAMA_CONTAINER_ENDPOINT: &str = "http://host.docker.internal:11434/v1/chat/completions";

/// Which completion backend the chatbot talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmSource {
    /// Hosted OpenAI chat completions
    OpenAi,
    /// Local Ollama server through its OpenAI-compatible endpoint
    Ollama,
}

impl LlmSource {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("openai") {
            LlmSource::OpenAi
        } else {
            LlmSource::Ollama
        }
    }
}

impl std::fmt::Display for LlmSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmSource::OpenAi => write!(f, "openai"),
            LlmSource::Ollama => write!(f, "ollama"),
        }
    }
}

/// Sampling options sent with every completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            top_p: 1.0,
        }
    }
}

/// Resolved LLM configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub source: LlmSource,
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub options: ChatOptions,
    pub request_timeout: Duration,
    /// JSON file listing the tool servers to start (`SERVER_CONFIG_FILE`)
    pub server_config_file: Option<PathBuf>,
}

impl Config {
    /// Load `.env` (if any) and resolve from process environment variables
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = lookup("LLM_SOURCE")
            .map(|s| LlmSource::parse(s.trim()))
            .unwrap_or(LlmSource::OpenAi);

        let (endpoint, default_model, api_key) = match source {
            LlmSource::OpenAi => (
                OPENAI_ENDPOINT.to_string(),
                "gpt-4o",
                lookup("OPENAI_API_KEY").unwrap_or_default(),
            ),
            LlmSource::Ollama => {
                let in_container = lookup("IN_CONTAINER").as_deref() == Some("true");
                let endpoint = if in_container {
                    OLLAMA_CONTAINER_ENDPOINT
                } else {
                    OLLAMA_ENDPOINT
                };
                (endpoint.to_string(), "llama3.2", String::new())
            }
        };

        let model = lookup("LLM_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string());

        let server_config_file = lookup("SERVER_CONFIG_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Self {
            source,
            endpoint,
            model,
            api_key,
            options: ChatOptions::default(),
            request_timeout: Duration::from_secs(120),
            server_config_file,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_openai() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")]));
        assert_eq!(config.source, LlmSource::OpenAi);
        assert_eq!(config.endpoint, OPENAI_ENDPOINT);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.api_key, "sk-test");
        assert!(config.server_config_file.is_none());
    }

    #[test]
    fn test_ollama_local_and_container() {
        let local = Config::from_lookup(lookup_from(&[("LLM_SOURCE", "ollama")]));
        assert_eq!(local.source, LlmSource::Ollama);
        assert_eq!(local.endpoint, OLLAMA_ENDPOINT);
        assert_eq!(local.model, "llama3.2");
        assert!(local.api_key.is_empty());

        let container = Config::from_lookup(lookup_from(&[
            ("LLM_SOURCE", "ollama"),
            ("IN_CONTAINER", "true"),
        ]));
        assert_eq!(container.endpoint, OLLAMA_CONTAINER_ENDPOINT);
    }

    #[test]
    fn test_model_and_server_file_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("LLM_MODEL", "gpt-4o-mini"),
            ("SERVER_CONFIG_FILE", "servers.json"),
        ]));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.server_config_file, Some(PathBuf::from("servers.json")));
    }

    #[test]
    fn test_chat_options_default() {
        let options = ChatOptions::default();
        assert_eq!(options.max_tokens, 4096);
        assert!((options.temperature - 0.7).abs() < f32::EPSILON);
    }
}
