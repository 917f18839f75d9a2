use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::outbox::{DomainEvent, EventEnvelope};
use super::aggregate::Order;
use super::value_objects::{OrderLine, OrderStatus};

// ============================================================================
// Order Events - published through the outbox next to the order write
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    StatusChanged(OrderStatusChanged),
}

impl DomainEvent for OrderEvent {
    fn event_name(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
        }
    }
}

impl OrderEvent {
    /// Envelope for a freshly persisted order
    pub fn placed(order: &Order, correlation_id: Uuid) -> EventEnvelope<OrderEvent> {
        let event = OrderEvent::Placed(OrderPlaced {
            user_id: order.user_id,
            lines: order.lines.clone(),
            total_price: order.total_price,
            placed_at: order.created_at,
        });
        Self::envelope(order, event, correlation_id)
    }

    /// Envelope for a status change already applied to `order`
    pub fn status_changed(
        order: &Order,
        from: OrderStatus,
        correlation_id: Uuid,
    ) -> EventEnvelope<OrderEvent> {
        let event = OrderEvent::StatusChanged(OrderStatusChanged {
            from,
            to: order.status,
            changed_at: order.updated_at,
        });
        Self::envelope(order, event, correlation_id)
    }

    fn envelope(order: &Order, event: OrderEvent, correlation_id: Uuid) -> EventEnvelope<OrderEvent> {
        EventEnvelope::wrap(order.id, order.version, event, correlation_id).by(order.user_id)
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Placed - checkout committed
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPlaced {
    pub user_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub total_price: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// Order Status Changed - lifecycle moved along one edge
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}
