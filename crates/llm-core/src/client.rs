//! HTTP client for OpenAI-compatible chat-completion endpoints

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::chat::{ChatMessage, CompletionClient, ToolDefinition};
use crate::config::{ChatOptions, Config};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Chat-completion client
#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: String,
    model: String,
    api_key: String,
    options: ChatOptions,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a client from resolved configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            options: config.options.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request the next assistant message, surfacing every failure
    pub async fn request_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage> {
        let body = CompletionRequest {
            messages,
            model: &self.model,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            top_p: self.options.top_p,
            stream: false,
            stop: None,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Requesting chat completion"
        );

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            error!(status = %status, details = %details, "Completion service returned an error");
            bail!("HTTP {}: {}", status, details.trim());
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("malformed completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .context("completion response contained no choices")
    }
}

#[async_trait]
impl CompletionClient for ChatClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> ChatMessage {
        match self.request_completion(messages, tools).await {
            Ok(message) => message,
            Err(e) => {
                let error_message = format!("Error getting LLM response: {:#}", e);
                error!("{}", error_message);
                ChatMessage::assistant(format!(
                    "I encountered an error: {}. Please try again or rephrase your request.",
                    error_message
                ))
            }
        }
    }
}
