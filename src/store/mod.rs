// ============================================================================
// Persistence
// ============================================================================
//
// - ports/     - traits the checkout core depends on
// - in_memory/ - default adapters, also used by every test
// - scylla/    - ScyllaDB adapters for orders (with outbox) and carts
//
// ============================================================================

mod error;
mod ports;
mod in_memory;
pub mod scylla;

pub use error::StoreError;
pub use ports::{CartStore, CatalogStore, DecrementOutcome, OrderStore};
pub use in_memory::{InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore};
