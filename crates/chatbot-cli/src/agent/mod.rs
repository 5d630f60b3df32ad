//! Agent orchestration
//!
//! Turns model replies into tool invocations and feeds the results back
//! until the model answers in plain text.

mod agent_loop;
pub mod prompt;
mod state;

pub use agent_loop::AgentLoop;
pub use state::{AgentConfig, Conversation, TurnOutcome, DEFAULT_MAX_ROUNDS};
