use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{SizeLabel, StockKey};

// ============================================================================
// Cart Value Objects
// ============================================================================

/// Intended purchase. Not a reservation: stock is only taken at checkout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub size: Option<SizeLabel>,
    pub quantity: u32,
    pub price_at_purchase: Decimal,
}

impl CartLine {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size.clone())
    }

    pub fn matches(&self, product_id: Uuid, size: Option<&SizeLabel>) -> bool {
        self.product_id == product_id && self.size.as_ref() == size
    }

    pub fn subtotal(&self) -> Decimal {
        self.price_at_purchase * Decimal::from(self.quantity)
    }
}

/// What an upsert did to the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    Added,
    Updated,
    Removed,
    Unchanged,
}
