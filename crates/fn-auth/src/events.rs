use serde::{Deserialize, Serialize};
use tracing::info;

/// A named notification forwarded from the platform (party invites, profile updates, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Type name of the event, e.g. `PartyInvitation`
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Observer receiving events; fire-and-forget
pub trait EventSink: Send + Sync {
    fn fire_event(&self, event: &Event);
}

/// Default sink that only traces the event type
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn fire_event(&self, event: &Event) {
        info!(kind = %event.kind, "Received event");
    }
}
