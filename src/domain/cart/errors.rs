use uuid::Uuid;

use crate::domain::catalog::StockKey;
use crate::store::StoreError;

// ============================================================================
// Cart Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        key: StockKey,
        requested: u32,
        available: u32,
    },

    #[error("Cart store failure: {0}")]
    Store(#[from] StoreError),
}
