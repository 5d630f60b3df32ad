//! Tool routing and dispatch

use std::sync::Arc;

use llm_core::ToolCall;
use serde_json::Value;
use tracing::Level;

use super::registry::ProviderSet;
use super::ToolProvider;
use crate::events::EventSink;

/// Result of routing a tool call
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    /// Tool executed; first text block of its output
    Success(String),
    /// Arguments were not a JSON object
    InvalidArguments { tool: String, reason: String },
    /// No provider advertises the tool
    NotFound(String),
    /// The provider failed while executing the tool
    Error { tool: String, reason: String },
    /// The tool returned no text content
    NoContent(String),
}

impl RouteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RouteResult::Success(_))
    }

    /// Render as tool-message content; failures start with `Error`
    pub fn into_content(self) -> String {
        match self {
            RouteResult::Success(text) => text,
            RouteResult::InvalidArguments { tool, reason } => {
                format!("Error: invalid arguments for tool '{}': {}", tool, reason)
            }
            RouteResult::NotFound(tool) => {
                format!("Error: tool not found: no server provides '{}'", tool)
            }
            RouteResult::Error { tool, reason } => {
                format!("Error executing tool '{}': {}", tool, reason)
            }
            RouteResult::NoContent(tool) => {
                format!("Error: tool '{}' returned no text content", tool)
            }
        }
    }
}

/// Decode model-supplied arguments into a JSON object; blank means `{}`
pub fn decode_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Router for dispatching tool calls to the provider that owns them
pub struct ToolRouter {
    providers: Arc<ProviderSet>,
    sink: Arc<dyn EventSink>,
}

impl ToolRouter {
    pub fn new(providers: Arc<ProviderSet>, sink: Arc<dyn EventSink>) -> Self {
        Self { providers, sink }
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// First provider (in registration order) currently advertising `name`
    async fn find_owner(&self, name: &str) -> Option<&Arc<dyn ToolProvider>> {
        for provider in self.providers.providers() {
            match provider.list_tools().await {
                Ok(tools) if tools.iter().any(|t| t.name == name) => return Some(provider),
                Ok(_) => {}
                Err(e) => self.sink.record(
                    Level::WARN,
                    "tool listing failed",
                    &[("provider", provider.name().to_string()), ("error", e.to_string())],
                ),
            }
        }
        None
    }

    /// Route a single tool call
    pub async fn route(&self, call: &ToolCall) -> RouteResult {
        let tool = call.name();

        let arguments = match decode_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(reason) => {
                self.sink.record(
                    Level::WARN,
                    "tool arguments rejected",
                    &[("tool", tool.to_string()), ("error", reason.clone())],
                );
                return RouteResult::InvalidArguments {
                    tool: tool.to_string(),
                    reason,
                };
            }
        };

        self.sink.record(
            Level::INFO,
            "tool requested",
            &[
                ("tool", tool.to_string()),
                ("arguments", call.function.arguments.clone()),
            ],
        );

        let Some(provider) = self.find_owner(tool).await else {
            self.sink.record(Level::WARN, "tool not found", &[("tool", tool.to_string())]);
            return RouteResult::NotFound(tool.to_string());
        };

        let result = match provider.execute_tool(tool, arguments).await {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("{:#}", e);
                self.sink.record(
                    Level::ERROR,
                    "tool execution failed",
                    &[
                        ("tool", tool.to_string()),
                        ("provider", provider.name().to_string()),
                        ("error", reason.clone()),
                    ],
                );
                return RouteResult::Error {
                    tool: tool.to_string(),
                    reason,
                };
            }
        };

        if let Some((progress, total)) = result.progress_pair() {
            let percent = if total > 0.0 { progress / total * 100.0 } else { 0.0 };
            self.sink.record(
                Level::INFO,
                "tool progress",
                &[
                    ("tool", tool.to_string()),
                    ("progress", progress.to_string()),
                    ("total", total.to_string()),
                    ("percent", format!("{:.1}", percent)),
                ],
            );
        }

        if result.is_error {
            self.sink.record(
                Level::WARN,
                "tool reported an error result",
                &[("tool", tool.to_string()), ("provider", provider.name().to_string())],
            );
        }

        match result.first_text() {
            Some(text) => {
                self.sink.record(
                    Level::INFO,
                    "tool completed",
                    &[
                        ("tool", tool.to_string()),
                        ("provider", provider.name().to_string()),
                        ("output_len", text.len().to_string()),
                    ],
                );
                RouteResult::Success(text.to_string())
            }
            None => RouteResult::NoContent(tool.to_string()),
        }
    }

    /// Route a call and render the outcome as tool-message content
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        self.route(call).await.into_content()
    }
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("providers", &self.providers)
            .finish()
    }
}
