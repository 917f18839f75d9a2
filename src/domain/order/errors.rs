use uuid::Uuid;

use crate::store::StoreError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatus { from: OrderStatus, to: OrderStatus },

    #[error("Order {0} is being updated concurrently, try again")]
    Busy(Uuid),

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Order store failure: {0}")]
    Store(#[from] StoreError),
}
