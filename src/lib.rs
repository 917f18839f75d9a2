// ============================================================================
// Storefront Checkout Engine
// ============================================================================
//
// Turns a user's cart into a confirmed order while keeping per-size stock
// from ever going negative under concurrent checkouts.
//
// - domain/   - catalog, cart and order aggregates
// - ledger/   - atomic stock reservation and release
// - pricing/  - order totals and line snapshots
// - checkout/ - the checkout saga and order status changes
// - store/    - storage ports with in-memory and ScyllaDB adapters
// - outbox/   - event envelopes written alongside orders
//
// ============================================================================

pub mod checkout;
pub mod config;
pub mod domain;
pub mod ledger;
pub mod metrics;
pub mod outbox;
pub mod pricing;
pub mod store;
pub mod utils;
