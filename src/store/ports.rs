use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::catalog::{Product, SizeLabel};
use crate::domain::order::{Order, OrderEvent, OrderPage, OrderQuery};
use crate::outbox::EventEnvelope;
use super::error::StoreError;

// ============================================================================
// Storage Ports
// ============================================================================
//
// The checkout core talks to persistence only through these traits.
// Adapters: `in_memory` (default, tests) and `scylla` (orders and carts).
//
// ============================================================================

/// Result of a conditional decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Units were taken; `remaining` is what is left in the bucket
    Applied { remaining: u32 },
    /// Bucket exists but holds fewer units than requested; nothing changed
    Insufficient { available: u32 },
    /// Product or bucket does not exist
    Missing,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Decrement one bucket only if it holds at least `quantity` units
    async fn conditional_decrement(
        &self,
        id: Uuid,
        size: Option<&SizeLabel>,
        quantity: u32,
    ) -> Result<DecrementOutcome, StoreError>;

    async fn increment(
        &self,
        id: Uuid,
        size: Option<&SizeLabel>,
        quantity: u32,
    ) -> Result<(), StoreError>;

    async fn put_product(&self, product: Product) -> Result<(), StoreError>;

    /// Returns whether a product was removed
    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;

    async fn save(&self, cart: &Cart) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order together with its outbox event
    async fn insert(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Persist a status change together with its outbox event
    async fn update_status(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError>;

    /// Orders of one user, newest first
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;

    /// Orders of every user, newest first, filtered and paginated
    async fn list(&self, query: &OrderQuery) -> Result<OrderPage<Order>, StoreError>;
}

/// Newest first, optional status filter, then one page
pub(crate) fn page_of(mut orders: Vec<Order>, query: &OrderQuery) -> OrderPage<Order> {
    if let Some(status) = query.status {
        orders.retain(|order| order.status == status);
    }
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    OrderPage::paginate(orders, query)
}
