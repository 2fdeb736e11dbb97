//! Service events and the broadcast EventBus
//!
//! Events describe what the service did (models loaded, requests answered,
//! analyses persisted). They are fire-and-forget notifications for SSE
//! clients and diagnostics, separate from the request/reply [`crate::bus`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::bus::FailureKind;

/// Companion service events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompanionEvent {
    /// All four model resources loaded and the router registered
    ModelsLoaded {
        /// Directory the models were read from
        models_dir: String,
        /// Wall time spent loading
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A bus request was answered successfully
    RequestCompleted {
        request_id: Uuid,
        address: String,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A bus request was answered with an explicit failure
    RequestFailed {
        request_id: Uuid,
        address: String,
        kind: FailureKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An analysis was written back to the reference store
    AnalysisPersisted {
        reference_id: String,
        sentence_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CompanionEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            CompanionEvent::ModelsLoaded { .. } => "ModelsLoaded",
            CompanionEvent::RequestCompleted { .. } => "RequestCompleted",
            CompanionEvent::RequestFailed { .. } => "RequestFailed",
            CompanionEvent::AnalysisPersisted { .. } => "AnalysisPersisted",
        }
    }
}

/// Broadcast distribution of [`CompanionEvent`]s
///
/// Backed by `tokio::sync::broadcast`:
/// - publishing never blocks on slow subscribers
/// - subscribers that fall behind lose the oldest events
/// - events published with no subscriber are dropped
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CompanionEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of subscribers reached
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CompanionEvent,
    ) -> Result<usize, broadcast::error::SendError<CompanionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CompanionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(id: &str) -> CompanionEvent {
        CompanionEvent::AnalysisPersisted {
            reference_id: id.to_string(),
            sentence_count: 1,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(persisted("a")).is_err());
        bus.emit_lossy(persisted("b"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(persisted("a")).unwrap();
        bus.emit(persisted("b")).unwrap();

        for expected in ["a", "b"] {
            match rx.recv().await.unwrap() {
                CompanionEvent::AnalysisPersisted { reference_id, .. } => {
                    assert_eq!(reference_id, expected)
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(persisted("x1")).unwrap();
        assert_eq!(json["type"], "AnalysisPersisted");
        assert_eq!(json["reference_id"], "x1");
        assert_eq!(persisted("x1").event_type(), "AnalysisPersisted");
    }

    #[test]
    fn test_failure_kind_serializes_as_code() {
        let event = CompanionEvent::RequestFailed {
            request_id: Uuid::new_v4(),
            address: "nlp.analyze".to_string(),
            kind: FailureKind::NotFound,
            message: "missing".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["kind"], "NOT_FOUND");
    }
}
