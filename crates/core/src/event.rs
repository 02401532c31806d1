//! Domain event system: observe runs without coupling to the orchestrator.
//!
//! Events are published as a run moves through its stages.
//! Subscribers (loggers, dashboards, tests) filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::Stage;

/// All domain events emitted by a reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run accepted a question
    RunStarted {
        run_id: String,
        question_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A stage finished successfully
    StageCompleted {
        run_id: String,
        stage: Stage,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A sub-question's retrieval failed and contributed no evidence
    RetrievalOmitted {
        run_id: String,
        sub_question: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Verification passed the threshold
    RunAccepted {
        run_id: String,
        confidence: f64,
        sources: usize,
        timestamp: DateTime<Utc>,
    },

    /// Verification fell below the threshold and the fallback ran
    RunEscalated {
        run_id: String,
        confidence: f64,
        issues: usize,
        timestamp: DateTime<Utc>,
    },

    /// The run aborted with a typed failure
    RunFailed {
        run_id: String,
        stage: Option<Stage>,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::StageCompleted {
            run_id: "run-1".into(),
            stage: Stage::Gather,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::StageCompleted { stage, duration_ms, .. } => {
                assert_eq!(*stage, Stage::Gather);
                assert_eq!(*duration_ms, 42);
            }
            _ => panic!("Expected StageCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::RunFailed {
            run_id: "run-1".into(),
            stage: None,
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
