use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{Product, SizeLabel};
use crate::domain::order::{Order, OrderLine, OrderStatus, ShippingAddress};

// ============================================================================
// Order Assembler
// ============================================================================
//
//   items    = sum(unit_price x quantity)
//   shipping = 0 if items > free_shipping_threshold else flat_shipping_fee
//   tax      = tax_rate x items
//   total    = items + shipping + tax
//
// Exact decimal arithmetic throughout; each component is rounded half away
// from zero to cents once, and the total is the sum of the rounded parts.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct PricingConfig {
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_fee: Decimal,
    pub tax_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(1000, 0),
            flat_shipping_fee: Decimal::new(50, 0),
            tax_rate: Decimal::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
}

/// A checkout item paired with the product it was resolved to
#[derive(Clone, Debug)]
pub struct ResolvedItem {
    pub product: Product,
    pub size: Option<SizeLabel>,
    pub quantity: u32,
}

impl ResolvedItem {
    /// Snapshot at the product's current price
    pub fn to_line(&self) -> OrderLine {
        OrderLine {
            product_id: self.product.id,
            title: self.product.title.clone(),
            quantity: self.quantity,
            unit_price: self.product.price,
            size: self.size.clone(),
        }
    }
}

fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone, Debug, Default)]
pub struct OrderAssembler {
    config: PricingConfig,
}

impl OrderAssembler {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn price(&self, lines: &[OrderLine]) -> PriceBreakdown {
        let items: Decimal = lines.iter().map(OrderLine::line_total).sum();

        let shipping = if items > self.config.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.config.flat_shipping_fee
        };
        let tax = self.config.tax_rate * items;

        let items_price = to_cents(items);
        let shipping_price = to_cents(shipping);
        let tax_price = to_cents(tax);

        PriceBreakdown {
            items_price,
            shipping_price,
            tax_price,
            total_price: items_price + shipping_price + tax_price,
        }
    }

    /// Build the confirmed order for `items`. Stock must already be reserved.
    pub fn assemble(&self, user_id: Uuid, items: &[ResolvedItem], shipping_address: ShippingAddress) -> Order {
        let lines: Vec<OrderLine> = items.iter().map(ResolvedItem::to_line).collect();
        let breakdown = self.price(&lines);
        let now = Utc::now();

        Order {
            id: Uuid::now_v7(),
            version: 1,
            user_id,
            lines,
            shipping_address,
            items_price: breakdown.items_price,
            shipping_price: breakdown.shipping_price,
            tax_price: breakdown.tax_price,
            total_price: breakdown.total_price,
            status: OrderStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }
}
