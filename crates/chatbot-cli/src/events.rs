//! Observability sink used by the agent loop and tool router
//!
//! The orchestration code reports what it does through `EventSink` instead of
//! calling logging macros directly, so tests can assert on the events.

use parking_lot::Mutex;
use tracing::Level;

/// Destination for structured orchestration events
pub trait EventSink: Send + Sync {
    fn record(&self, level: Level, event: &str, fields: &[(&str, String)]);
}

fn render_fields(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, level: Level, event: &str, fields: &[(&str, String)]) {
        let fields = render_fields(fields);
        if level == Level::ERROR {
            tracing::error!(fields = %fields, "{}", event);
        } else if level == Level::WARN {
            tracing::warn!(fields = %fields, "{}", event);
        } else if level == Level::INFO {
            tracing::info!(fields = %fields, "{}", event);
        } else if level == Level::DEBUG {
            tracing::debug!(fields = %fields, "{}", event);
        } else {
            tracing::trace!(fields = %fields, "{}", event);
        }
    }
}

/// A recorded event
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub level: Level,
    pub event: String,
    pub fields: Vec<(String, String)>,
}

impl RecordedEvent {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Events with the given name, in recording order
    pub fn named(&self, event: &str) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, level: Level, event: &str, fields: &[(&str, String)]) {
        self.events.lock().push(RecordedEvent {
            level,
            event: event.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
    }
}
