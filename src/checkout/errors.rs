use uuid::Uuid;

use crate::ledger::StockShortfall;
use crate::store::StoreError;
use super::saga::CheckoutState;

// ============================================================================
// Checkout Errors
// ============================================================================

/// Rejected input. Raised before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No order items")]
    NoItems,

    #[error("Item {index}: product is required")]
    MissingProduct { index: usize },

    #[error("Item {index}: invalid product id {value:?}")]
    InvalidProductId { index: usize, value: String },

    #[error("Item {index}: quantity is required")]
    MissingQuantity { index: usize },

    #[error("Item {index}: quantity must be a whole number of at least 1, got {value:?}")]
    InvalidQuantity { index: usize, value: String },

    #[error("Please provide shipping address")]
    MissingShippingAddress,

    #[error("Shipping address field {0} is required")]
    MissingAddressField(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Invalid checkout: {0}")]
    Validation(#[from] ValidationError),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Checkout aborted while {state}: {reason}")]
    Aborted { state: CheckoutState, reason: String },

    #[error("Order could not be persisted: {0}")]
    Persistence(#[source] StoreError),

    #[error("Store unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

impl CheckoutError {
    /// Label used for the checkout outcome metric
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "invalid",
            CheckoutError::ProductNotFound(_) => "product_not_found",
            CheckoutError::InsufficientStock(_) => "insufficient_stock",
            CheckoutError::Aborted { .. } => "aborted",
            CheckoutError::Persistence(_) => "persistence_failed",
            CheckoutError::Unavailable(_) => "unavailable",
        }
    }
}
