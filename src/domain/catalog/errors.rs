use super::value_objects::StockKey;

// ============================================================================
// Stock Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StockError {
    #[error("No stock bucket for {0}")]
    MissingBucket(StockKey),

    #[error("Insufficient stock for {key}: requested {requested}, available {available}")]
    Insufficient {
        key: StockKey,
        requested: u32,
        available: u32,
    },

    #[error("Stock overflow for {0}")]
    Overflow(StockKey),
}
