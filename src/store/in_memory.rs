use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::catalog::{Product, SizeLabel, StockError, StockKey};
use crate::domain::order::{Order, OrderEvent, OrderPage, OrderQuery};
use crate::outbox::{EventEnvelope, OutboxMessage};
use super::error::StoreError;
use super::ports::{page_of, CartStore, CatalogStore, DecrementOutcome, OrderStore};

// ============================================================================
// In-Memory Stores
// ============================================================================
//
// Each store keeps its documents behind one async RwLock, so every trait
// call is a single atomic step with respect to other calls.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        {
            let mut map = catalog.products.write().await;
            for product in products {
                map.insert(product.id, product);
            }
        }
        catalog
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn conditional_decrement(
        &self,
        id: Uuid,
        size: Option<&SizeLabel>,
        quantity: u32,
    ) -> Result<DecrementOutcome, StoreError> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(DecrementOutcome::Missing);
        };

        match product.available(size) {
            None => Ok(DecrementOutcome::Missing),
            Some(available) if available < quantity => {
                Ok(DecrementOutcome::Insufficient { available })
            }
            Some(_) => {
                let remaining = product.decrement(size, quantity)?;
                Ok(DecrementOutcome::Applied { remaining })
            }
        }
    }

    async fn increment(
        &self,
        id: Uuid,
        size: Option<&SizeLabel>,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| StockError::MissingBucket(StockKey::new(id, size.cloned())))?;
        product.increment(size, quantity)?;
        Ok(())
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }

    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.products.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<Uuid, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        Ok(self.carts.read().await.get(&user_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        self.carts.write().await.insert(cart.user_id, cart.clone());
        Ok(())
    }
}

#[derive(Default)]
struct OrderTables {
    orders: HashMap<Uuid, Order>,
    outbox: Vec<OutboxMessage>,
}

pub struct InMemoryOrderStore {
    tables: RwLock<OrderTables>,
    topic_name: String,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new("order-events")
    }
}

impl InMemoryOrderStore {
    pub fn new(topic_name: &str) -> Self {
        Self {
            tables: RwLock::new(OrderTables::default()),
            topic_name: topic_name.to_string(),
        }
    }

    /// Outbox rows written so far, oldest first
    pub async fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.tables.read().await.outbox.clone()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    fn outbox_row(&self, event: &EventEnvelope<OrderEvent>) -> Result<OutboxMessage, StoreError> {
        Ok(OutboxMessage::from_envelope("Order", &self.topic_name, event)?)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError> {
        let message = self.outbox_row(event)?;
        let mut tables = self.tables.write().await;

        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::Backend(format!("order {} already exists", order.id)));
        }

        tables.orders.insert(order.id, order.clone());
        tables.outbox.push(message);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn update_status(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError> {
        let message = self.outbox_row(event)?;
        let mut tables = self.tables.write().await;

        let stored = tables
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::Backend(format!("order {} does not exist", order.id)))?;
        stored.status = order.status;
        stored.version = order.version;
        stored.updated_at = order.updated_at;

        tables.outbox.push(message);
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .tables
            .read()
            .await
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list(&self, query: &OrderQuery) -> Result<OrderPage<Order>, StoreError> {
        let orders = self.tables.read().await.orders.values().cloned().collect();
        Ok(page_of(orders, query))
    }
}
