//! System prompt for the chat session

use std::path::Path;

use anyhow::{Context, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools provided by external servers.

Use a tool whenever it would give a more accurate or more current answer than your own knowledge. \
You may call several tools in one response; they run in the order you list them. \
If a tool returns a message starting with \"Error\", read it, fix the arguments or pick another tool, \
and try again only if it is likely to help.

When you have everything you need, answer the user directly in plain language without calling more tools.";

/// Prompt from `path`, or the built-in prompt when no path is given
pub fn load_system_prompt(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            let prompt = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
            Ok(prompt.trim().to_string())
        }
        None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}
