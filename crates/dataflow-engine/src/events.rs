//! Event types for observing a graph
//!
//! Events are sent from the graph to any consumer (an editor canvas, a
//! recorder in tests) to report structural changes and run-state changes.
//! No event is needed for the engine to work correctly.

use serde::{Deserialize, Serialize};

use crate::types::{LinkId, NodeId};

/// Trait for receiving graph events
///
/// This abstracts over the transport mechanism (channel, canvas, log)
/// allowing the engine to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered
    fn send(&self, event: GraphEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    /// The sink's buffer lock was poisoned by a panicking writer
    pub fn poisoned() -> Self {
        Self {
            message: "Event buffer poisoned".to_string(),
        }
    }
}

/// Events emitted by a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// The graph structure changed; `action` names the mutation
    #[serde(rename_all = "camelCase")]
    GraphChanged { action: String, version: u64 },

    /// A node was added
    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: NodeId },

    /// A node was removed
    #[serde(rename_all = "camelCase")]
    NodeRemoved { node_id: NodeId },

    /// A link was created or deleted
    #[serde(rename_all = "camelCase")]
    ConnectionChanged { link_id: LinkId, connected: bool },

    /// Views should redraw
    #[serde(rename_all = "camelCase")]
    DirtyCanvas { foreground: bool, background: bool },

    /// The graph entered the running state
    Started,

    /// The graph left the running state
    Stopped,

    /// A step failed and the error was contained
    #[serde(rename_all = "camelCase")]
    ExecutionFailed { error: String },
}

impl GraphEvent {
    /// Create a graph changed event
    pub fn changed(action: &str, version: u64) -> Self {
        Self::GraphChanged {
            action: action.to_string(),
            version,
        }
    }
}

/// A no-op event sink that discards all events
///
/// Used when no observer is attached.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: GraphEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<GraphEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Actions of the collected change events, in order
    pub fn change_actions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GraphEvent::GraphChanged { action, .. } => Some(action),
                _ => None,
            })
            .collect()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::poisoned())?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(GraphEvent::changed("nodeAdd", 1)).unwrap();
        sink.send(GraphEvent::Started).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);

        match &events[0] {
            GraphEvent::GraphChanged { action, version } => {
                assert_eq!(action, "nodeAdd");
                assert_eq!(*version, 1);
            }
            _ => panic!("Expected GraphChanged event"),
        }
        assert_eq!(sink.change_actions(), vec!["nodeAdd".to_string()]);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(GraphEvent::Stopped).unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(GraphEvent::DirtyCanvas {
            foreground: true,
            background: false,
        })
        .unwrap();
        assert_eq!(json["type"], "dirtyCanvas");
        assert_eq!(json["foreground"], true);
    }
}
