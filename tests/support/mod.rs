#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use storefront_checkout::checkout::{CheckoutConfig, CheckoutService};
use storefront_checkout::domain::cart::Cart;
use storefront_checkout::domain::catalog::{Product, SizeLabel};
use storefront_checkout::domain::order::{Order, OrderEvent, OrderPage, OrderQuery, ShippingAddress};
use storefront_checkout::ledger::LedgerConfig;
use storefront_checkout::metrics::Metrics;
use storefront_checkout::outbox::EventEnvelope;
use storefront_checkout::store::{
    CartStore, CatalogStore, DecrementOutcome, InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore, OrderStore, StoreError,
};
use storefront_checkout::utils::{CircuitBreakerConfig, RetryConfig};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn size(label: &str) -> Option<SizeLabel> {
    Some(SizeLabel::new(label))
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Katherine Johnson".into(),
        address: "4 Orbit Lane".into(),
        city: "Hampton".into(),
        postal_code: "23666".into(),
        country: "US".into(),
        phone: "555-0199".into(),
    }
}

pub fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

pub fn test_config() -> CheckoutConfig {
    CheckoutConfig {
        ledger: LedgerConfig {
            lock_timeout: Duration::from_millis(500),
            retry: quick_retry(),
        },
        follow_up_retry: quick_retry(),
        order_store_breaker: CircuitBreakerConfig {
            failure_threshold: 2,
            open_for: Duration::from_secs(60),
            success_threshold: 1,
        },
        ..CheckoutConfig::default()
    }
}

// ============================================================================
// Fault-injecting stores
// ============================================================================

/// Order store whose writes fail while `failing` is set
pub struct FailingOrderStore {
    pub inner: InMemoryOrderStore,
    pub failing: AtomicBool,
    pub insert_calls: AtomicU32,
}

impl FailingOrderStore {
    pub fn new(failing: bool) -> Self {
        Self {
            inner: InMemoryOrderStore::default(),
            failing: AtomicBool::new(failing),
            insert_calls: AtomicU32::new(0),
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("order store write timeout".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn insert(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.insert(order, event).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.inner.get(id).await
    }

    async fn update_status(&self, order: &Order, event: &EventEnvelope<OrderEvent>) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update_status(order, event).await
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        self.inner.list_for_user(user_id).await
    }

    async fn list(&self, query: &OrderQuery) -> Result<OrderPage<Order>, StoreError> {
        self.inner.list(query).await
    }
}

/// Catalog whose conditional decrements take `delay`, holding the
/// ledger's key locks for that long
pub struct SlowCatalog {
    pub inner: InMemoryCatalog,
    pub delay: Duration,
}

#[async_trait]
impl CatalogStore for SlowCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        self.inner.get_product(id).await
    }

    async fn conditional_decrement(
        &self,
        id: Uuid,
        size: Option<&SizeLabel>,
        quantity: u32,
    ) -> Result<DecrementOutcome, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.conditional_decrement(id, size, quantity).await
    }

    async fn increment(&self, id: Uuid, size: Option<&SizeLabel>, quantity: u32) -> Result<(), StoreError> {
        self.inner.increment(id, size, quantity).await
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        self.inner.put_product(product).await
    }

    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.remove_product(id).await
    }
}

/// Catalog whose increments fail while `failing_increments` is set
pub struct RestockRefusingCatalog {
    pub inner: InMemoryCatalog,
    pub failing_increments: AtomicBool,
}

#[async_trait]
impl CatalogStore for RestockRefusingCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        self.inner.get_product(id).await
    }

    async fn conditional_decrement(
        &self,
        id: Uuid,
        size: Option<&SizeLabel>,
        quantity: u32,
    ) -> Result<DecrementOutcome, StoreError> {
        self.inner.conditional_decrement(id, size, quantity).await
    }

    async fn increment(&self, id: Uuid, size: Option<&SizeLabel>, quantity: u32) -> Result<(), StoreError> {
        if self.failing_increments.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog write timeout".into()));
        }
        self.inner.increment(id, size, quantity).await
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        self.inner.put_product(product).await
    }

    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.remove_product(id).await
    }
}

/// Cart store whose saves fail while `failing` is set
pub struct FlakyCartStore {
    pub inner: InMemoryCartStore,
    pub failing: AtomicBool,
}

impl FlakyCartStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryCartStore::new(),
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CartStore for FlakyCartStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        self.inner.load(user_id).await
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cart store write timeout".into()));
        }
        self.inner.save(cart).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub service: Arc<CheckoutService>,
    pub catalog: Arc<InMemoryCatalog>,
    pub carts: Arc<FlakyCartStore>,
    pub orders: Arc<FailingOrderStore>,
    pub metrics: Arc<Metrics>,
}

impl Harness {
    pub async fn new(products: Vec<Product>) -> Self {
        Self::with_config(products, test_config()).await
    }

    pub async fn with_config(products: Vec<Product>, config: CheckoutConfig) -> Self {
        let catalog = Arc::new(InMemoryCatalog::with_products(products).await);
        let carts = Arc::new(FlakyCartStore::new());
        let orders = Arc::new(FailingOrderStore::new(false));
        let metrics = Arc::new(Metrics::new().unwrap());

        let service = Arc::new(CheckoutService::new(
            catalog.clone(),
            carts.clone(),
            orders.clone(),
            config,
            metrics.clone(),
        ));

        Self {
            service,
            catalog,
            carts,
            orders,
            metrics,
        }
    }

    pub async fn stock(&self, product_id: Uuid, size: Option<&str>) -> u32 {
        let label = size.map(SizeLabel::new);
        self.catalog
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .available(label.as_ref())
            .unwrap()
    }

    pub async fn product(&self, product_id: Uuid) -> Product {
        self.catalog.get_product(product_id).await.unwrap().unwrap()
    }
}
