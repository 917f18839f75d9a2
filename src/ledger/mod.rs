// ============================================================================
// Stock Ledger - the only writer of product stock counters
// ============================================================================

mod errors;
mod lock_table;
mod stock_ledger;

pub use errors::{LedgerError, StockShortfall};
pub use lock_table::{HeldLocks, LockTable, LockTimedOut};
pub use stock_ledger::{LedgerConfig, Reservation, StockLedger};
