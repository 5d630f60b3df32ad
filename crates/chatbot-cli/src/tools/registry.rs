//! Ordered set of tool providers and their shared lifecycle

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::{ToolDescriptor, ToolProvider};

/// Providers in registration order; earlier providers win name lookups
#[derive(Default)]
pub struct ProviderSet {
    providers: Vec<Arc<dyn ToolProvider>>,
}

impl ProviderSet {
    /// Create a new empty set
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a provider after all existing ones
    pub fn register(&mut self, provider: Arc<dyn ToolProvider>) {
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &[Arc<dyn ToolProvider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Initialize every provider in order.
    ///
    /// The first failure aborts start-up: all providers are cleaned up and
    /// the error is returned.
    pub async fn initialize_all(&self) -> Result<()> {
        for provider in &self.providers {
            debug!(provider = provider.name(), "Initializing tool provider");
            if let Err(e) = provider.initialize().await {
                error!(provider = provider.name(), error = %e, "Failed to initialize tool provider");
                self.cleanup_all().await;
                return Err(e)
                    .with_context(|| format!("Failed to initialize tool provider {}", provider.name()));
            }
            info!(provider = provider.name(), "Tool provider ready");
        }
        Ok(())
    }

    /// Every advertised tool, flattened in provider order
    pub async fn all_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        for provider in &self.providers {
            let listed = provider
                .list_tools()
                .await
                .with_context(|| format!("Failed to list tools from {}", provider.name()))?;
            debug!(provider = provider.name(), tools = listed.len(), "Discovered tools");
            tools.extend(listed);
        }
        Ok(tools)
    }

    /// Release every provider concurrently.
    ///
    /// Failures are logged and returned as `(provider, error)` pairs; they
    /// never abort the remaining cleanups.
    pub async fn cleanup_all(&self) -> Vec<(String, anyhow::Error)> {
        let results = join_all(self.providers.iter().map(|provider| async move {
            (provider.name().to_string(), provider.cleanup().await)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(provider = %name, error = %e, "Error during tool provider cleanup");
                    Some((name, e))
                }
            })
            .collect()
    }
}

/// Names declared more than once, each reported once in first-seen order
pub fn duplicate_names(tools: &[ToolDescriptor]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for tool in tools {
        if !seen.insert(tool.name.as_str()) && !duplicates.contains(&tool.name) {
            duplicates.push(tool.name.clone());
        }
    }
    duplicates
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ProviderSet").field("providers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::FakeProvider;

    #[tokio::test]
    async fn test_all_tools_in_registration_order() {
        let mut set = ProviderSet::new();
        set.register(Arc::new(FakeProvider::new("a").with_tool("search", "")));
        set.register(Arc::new(
            FakeProvider::new("b").with_tool("fetch", "").with_tool("save", ""),
        ));

        let names: Vec<String> = set.all_tools().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["search", "fetch", "save"]);
    }

    #[tokio::test]
    async fn test_initialize_failure_cleans_up_everyone() {
        let a = Arc::new(FakeProvider::new("a"));
        let mut broken = FakeProvider::new("b");
        broken.fail_initialize = true;
        let b = Arc::new(broken);
        let c = Arc::new(FakeProvider::new("c"));

        let mut set = ProviderSet::new();
        set.register(a.clone());
        set.register(b.clone());
        set.register(c.clone());

        let err = set.initialize_all().await.unwrap_err();
        assert!(format!("{:#}", err).contains("refused to start"));
        assert_eq!(a.cleanups(), 1);
        assert_eq!(b.cleanups(), 1);
        assert_eq!(c.cleanups(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failures_are_reported_not_fatal() {
        let mut noisy = FakeProvider::new("noisy");
        noisy.fail_cleanup = true;
        let noisy = Arc::new(noisy);
        let quiet = Arc::new(FakeProvider::new("quiet"));

        let mut set = ProviderSet::new();
        set.register(noisy.clone());
        set.register(quiet.clone());

        let failures = set.cleanup_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "noisy");
        assert_eq!(quiet.cleanups(), 1);

        // idempotent: a second pass still reaches every provider
        set.cleanup_all().await;
        assert_eq!(quiet.cleanups(), 2);
    }

    #[test]
    fn test_duplicate_names() {
        let tools = vec![
            ToolDescriptor::new("search", "", serde_json::Value::Null),
            ToolDescriptor::new("fetch", "", serde_json::Value::Null),
            ToolDescriptor::new("search", "", serde_json::Value::Null),
            ToolDescriptor::new("search", "", serde_json::Value::Null),
        ];
        assert_eq!(duplicate_names(&tools), vec!["search".to_string()]);
        assert!(duplicate_names(&tools[..2]).is_empty());
    }
}
