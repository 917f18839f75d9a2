use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Envelope - metadata around an outgoing domain event
// ============================================================================

/// An event an aggregate emits through the outbox
pub trait DomainEvent: Serialize + Clone + Send + Sync {
    /// Name of this particular event, e.g. `OrderPlaced`
    fn event_name(&self) -> &'static str;

    /// Payload schema version, bumped on breaking changes
    fn schema_version(&self) -> i32 {
        1
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    /// Time-ordered (v7), so outbox rows sort by creation
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    /// Aggregate version the event leaves behind
    pub aggregate_version: i64,
    pub event_type: String,
    pub event_version: i32,
    pub event_data: E,
    /// Ties every event of one checkout or status change together
    pub correlation_id: Uuid,
    /// User the change was made for
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn wrap(aggregate_id: Uuid, aggregate_version: i64, event: E, correlation_id: Uuid) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_version,
            event_type: event.event_name().to_string(),
            event_version: event.schema_version(),
            event_data: event,
            correlation_id,
            actor_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn by(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// The event alone, as JSON
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.event_data)
    }
}
