//! Domain events: what happened during a turn, for whoever is listening.
//!
//! The orchestrator publishes; the CLI and tests subscribe. Nothing in the
//! Reason-Act loop waits on a subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Emitted once per turn, including turns answered by a fallback
    TurnCompleted {
        user_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    ReasoningCompleted {
        user_id: String,
        response_type: String,
        prompt_id: Option<String>,
        cached: bool,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },

    /// One capability attempt, successful or not
    CapabilityExecuted {
        user_id: String,
        capability: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    PatternsRefreshed {
        user_id: String,
        usage_patterns: usize,
        error_patterns: usize,
        timestamp: DateTime<Utc>,
    },

    /// A prompt variant was deactivated for underperforming
    VariantArchived {
        user_id: String,
        variant_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A failure that was absorbed into a graceful reply
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Snake-case event name, matching the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TurnCompleted { .. } => "turn_completed",
            Self::ReasoningCompleted { .. } => "reasoning_completed",
            Self::CapabilityExecuted { .. } => "capability_executed",
            Self::PatternsRefreshed { .. } => "patterns_refreshed",
            Self::VariantArchived { .. } => "variant_archived",
            Self::ErrorOccurred { .. } => "error_occurred",
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TurnCompleted { user_id, .. }
            | Self::ReasoningCompleted { user_id, .. }
            | Self::CapabilityExecuted { user_id, .. }
            | Self::PatternsRefreshed { user_id, .. }
            | Self::VariantArchived { user_id, .. } => Some(user_id),
            Self::ErrorOccurred { .. } => None,
        }
    }
}

/// Fan-out of [`DomainEvent`]s over a `tokio` broadcast channel.
///
/// Slow subscribers lag and lose the oldest events; publishers never block.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // an error here only means nobody is subscribed
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
