use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::envelope::{DomainEvent, EventEnvelope};

/// Row written to the outbox in the same write as the aggregate it
/// describes. A relay outside this crate publishes it to `topic`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_id: Uuid,
    pub event_type: String,
    pub event_version: i32,
    pub payload: String,
    pub topic: String,
    pub partition_key: String,
    pub correlation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn from_envelope<E: DomainEvent>(
        aggregate_type: &str,
        topic: &str,
        envelope: &EventEnvelope<E>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_id: envelope.aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            event_version: envelope.event_version,
            payload: envelope.payload()?,
            topic: topic.to_string(),
            partition_key: envelope.aggregate_id.to_string(),
            correlation_id: envelope.correlation_id,
            created_at: Utc::now(),
        })
    }
}
