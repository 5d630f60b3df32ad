//! Tool framework: descriptors, invocation results and the provider contract
//!
//! Tools are not implemented here. They live behind `ToolProvider`s (MCP
//! servers in production, fakes in tests); this module only describes them.

pub mod registry;
pub mod router;

use anyhow::Result;
use async_trait::async_trait;
use llm_core::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invocable capability advertised by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Name the model uses to call the tool
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the accepted arguments
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Wrap as a callable-function envelope for the model
    pub fn to_definition(&self) -> ToolDefinition {
        let parameters = if self.input_schema.is_null() {
            serde_json::json!({"type": "object", "properties": {}})
        } else {
            self.input_schema.clone()
        };
        ToolDefinition::function(&self.name, &self.description, parameters)
    }
}

/// One block of tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: Some(text.into()),
            data: None,
            mime_type: None,
        }
    }
}

/// Result of a tool invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
    /// Work done so far for long-running invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl ToolCallResult {
    /// Single text block result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: f64, total: f64) -> Self {
        self.progress = Some(progress);
        self.total = Some(total);
        self
    }

    /// Text of the first content block whose text is not blank.
    ///
    /// Only this text reaches the transcript; further blocks are ignored.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find_map(|block| block.text.as_deref().filter(|text| !text.trim().is_empty()))
    }

    /// `(progress, total)` when the provider reported both
    pub fn progress_pair(&self) -> Option<(f64, f64)> {
        match (self.progress, self.total) {
            (Some(progress), Some(total)) => Some((progress, total)),
            _ => None,
        }
    }
}

/// A backend that exposes tools to the agent
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Bring the provider to a ready state
    async fn initialize(&self) -> Result<()>;

    /// Tools currently advertised; may be called repeatedly
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke `name` with decoded arguments
    async fn execute_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult>;

    /// Release resources; safe to call more than once
    async fn cleanup(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by the router, registry and agent tests

    use super::*;
    use anyhow::bail;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Provider whose tools answer with canned text and record every call
    pub struct FakeProvider {
        name: String,
        tools: Vec<ToolDescriptor>,
        responses: HashMap<String, ToolCallResult>,
        failing_tools: Vec<String>,
        pub fail_initialize: bool,
        pub fail_list: bool,
        pub fail_cleanup: bool,
        pub calls: Mutex<Vec<(String, Value)>>,
        pub list_count: AtomicUsize,
        pub cleanup_count: AtomicUsize,
        /// Shared log of "<provider>:<tool>" across providers
        pub journal: Option<Arc<Mutex<Vec<String>>>>,
    }

    impl FakeProvider {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                tools: Vec::new(),
                responses: HashMap::new(),
                failing_tools: Vec::new(),
                fail_initialize: false,
                fail_list: false,
                fail_cleanup: false,
                calls: Mutex::new(Vec::new()),
                list_count: AtomicUsize::new(0),
                cleanup_count: AtomicUsize::new(0),
                journal: None,
            }
        }

        pub fn with_tool(mut self, tool: &str, response: &str) -> Self {
            self.tools.push(ToolDescriptor::new(
                tool,
                format!("{} tool", tool),
                serde_json::json!({"type": "object"}),
            ));
            self.responses.insert(tool.to_string(), ToolCallResult::text(response));
            self
        }

        pub fn with_result(mut self, tool: &str, result: ToolCallResult) -> Self {
            self.tools.push(ToolDescriptor::new(tool, "", Value::Null));
            self.responses.insert(tool.to_string(), result);
            self
        }

        pub fn with_failing_tool(mut self, tool: &str) -> Self {
            self.tools.push(ToolDescriptor::new(tool, "always fails", Value::Null));
            self.failing_tools.push(tool.to_string());
            self
        }

        pub fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
            self.journal = Some(journal);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        pub fn lists(&self) -> usize {
            self.list_count.load(Ordering::SeqCst)
        }

        pub fn cleanups(&self) -> usize {
            self.cleanup_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn initialize(&self) -> Result<()> {
            if self.fail_initialize {
                bail!("{} refused to start", self.name);
            }
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            self.list_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_list {
                bail!("{} lost its connection", self.name);
            }
            Ok(self.tools.clone())
        }

        async fn execute_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
            self.calls.lock().push((name.to_string(), arguments));
            if let Some(journal) = &self.journal {
                journal.lock().push(format!("{}:{}", self.name, name));
            }
            if self.failing_tools.iter().any(|t| t == name) {
                bail!("{} crashed", name);
            }
            self.responses
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown tool {}", name))
        }

        async fn cleanup(&self) -> Result<()> {
            self.cleanup_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_cleanup {
                bail!("{} did not shut down cleanly", self.name);
            }
            Ok(())
        }
    }
}
