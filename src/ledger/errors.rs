use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::catalog::{StockKey, StockRequest};
use crate::store::StoreError;

// ============================================================================
// Ledger Errors
// ============================================================================

/// One item the catalog cannot cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortfall {
    pub key: StockKey,
    pub requested: u32,
    pub available: u32,
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: requested {}, available {}",
            self.key, self.requested, self.available
        )
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient stock: {}", join(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Stock locks not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Stock release incomplete, not restored: {}", join(.remaining))]
    ReleaseIncomplete { remaining: Vec<StockRequest> },
}
