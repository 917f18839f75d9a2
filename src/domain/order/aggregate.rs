use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::StockRequest;
use super::errors::OrderError;
use super::value_objects::{OrderLine, OrderStatus, ShippingAddress};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Written once by the checkout orchestrator. Afterwards only `status`
// moves, along the lifecycle graph of `OrderStatus`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub version: i64,
    pub user_id: Uuid,

    // Snapshot
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,

    // Price breakdown
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,

    pub status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Apply a status change.
    ///
    /// Returns `Ok(false)` when `next` equals the current status; the order
    /// is left untouched in that case and on error.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<bool, OrderError> {
        if self.status == next {
            return Ok(false);
        }

        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatus {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Stock held by this order, one request per line
    pub fn stock_requests(&self) -> Vec<StockRequest> {
        self.lines
            .iter()
            .map(|line| StockRequest::new(line.product_id, line.size.clone(), line.quantity))
            .collect()
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}
