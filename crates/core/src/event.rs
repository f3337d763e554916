//! Domain events: progress notifications from a running agent.
//!
//! The executor, loop, planner and coordinator publish events as they work.
//! Subscribers (the CLI progress printer, tests) observe without coupling to
//! the loop itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The reasoning service answered a decision request
    DecisionReceived {
        transcript_id: String,
        model: String,
        requested_actions: usize,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// An action request was resolved (executed, denied, skipped or failed)
    ActionExecuted {
        action: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The plan manager produced a plan
    PlanCreated {
        goal: String,
        steps: usize,
        revision: usize,
        timestamp: DateTime<Utc>,
    },

    /// An attempt asked to be replanned
    RevisionRequested {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A coordinator run reached a terminal state
    RunFinished {
        outcome: String,
        iterations: usize,
        replans: usize,
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
