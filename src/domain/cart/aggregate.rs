use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::SizeLabel;
use super::value_objects::{CartChange, CartLine};

// ============================================================================
// Cart Aggregate - one per user
// ============================================================================
//
// Invariants:
// - every line has quantity >= 1
// - (product_id, size) is unique within the cart
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: Uuid,
    pub lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line(&self, product_id: Uuid, size: Option<&SizeLabel>) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(product_id, size))
    }

    /// Set the quantity of a line, refreshing its price.
    ///
    /// Quantity 0 removes the line; removing an absent line is a no-op.
    pub fn set_line(
        &mut self,
        product_id: Uuid,
        size: Option<SizeLabel>,
        quantity: u32,
        price: Decimal,
    ) -> CartChange {
        let position = self
            .lines
            .iter()
            .position(|line| line.matches(product_id, size.as_ref()));

        let change = match (position, quantity) {
            (None, 0) => CartChange::Unchanged,
            (Some(index), 0) => {
                self.lines.remove(index);
                CartChange::Removed
            }
            (Some(index), quantity) => {
                let line = &mut self.lines[index];
                line.quantity = quantity;
                line.price_at_purchase = price;
                CartChange::Updated
            }
            (None, quantity) => {
                self.lines.push(CartLine {
                    product_id,
                    size,
                    quantity,
                    price_at_purchase: price,
                });
                CartChange::Added
            }
        };

        if change != CartChange::Unchanged {
            self.updated_at = Utc::now();
        }
        change
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.updated_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of price-at-purchase times quantity
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }
}
