// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Order writes carry their domain event; stores persist both in one write
// so downstream consumers never see an order without its event.
//
// ============================================================================

mod envelope;
mod message;

pub use envelope::{DomainEvent, EventEnvelope};
pub use message::OutboxMessage;
