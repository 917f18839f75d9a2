use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::cart::{CartError, CartService};
use crate::domain::catalog::StockRequest;
use crate::domain::order::{Order, OrderError, OrderEvent, OrderPage, OrderQuery, OrderStatus, ShippingAddress};
use crate::ledger::{LedgerConfig, LedgerError, LockTable, Reservation, StockLedger};
use crate::metrics::Metrics;
use crate::pricing::{OrderAssembler, PricingConfig, ResolvedItem};
use crate::store::{CartStore, CatalogStore, OrderStore, StoreError};
use crate::utils::{retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RetryConfig};
use super::errors::CheckoutError;
use super::request::{CheckoutItem, CheckoutRequest, ValidatedCheckout};
use super::saga::{CheckoutSaga, CheckoutState};

// ============================================================================
// Checkout Service
// ============================================================================
//
// Orchestrates: Validate -> Resolve products -> Reserve stock (ledger)
//   -> Price (assembler) -> Persist order + outbox event -> Clear cart
//
// Failure handling:
// - anything before the reservation: no side effects
// - persistence failure: reserved stock is released, then the error returned
// - restock the store keeps refusing: lines queued for a later release
// - cart clear failure: order stands, user queued for a later clear
//
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct CheckoutConfig {
    pub pricing: PricingConfig,
    pub ledger: LedgerConfig,
    /// Cart clears right after a checkout
    pub follow_up_retry: RetryConfig,
    pub order_store_breaker: CircuitBreakerConfig,
}

pub struct CheckoutService {
    catalog: Arc<dyn CatalogStore>,
    carts: CartService,
    orders: Arc<dyn OrderStore>,
    ledger: Arc<StockLedger>,
    assembler: OrderAssembler,
    breaker: CircuitBreaker,
    order_locks: LockTable<Uuid>,
    pending_cart_clears: Mutex<BTreeSet<Uuid>>,
    pending_restocks: Mutex<Vec<StockRequest>>,
    config: CheckoutConfig,
    metrics: Arc<Metrics>,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        cart_store: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        config: CheckoutConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let ledger = Arc::new(StockLedger::new(catalog.clone(), config.ledger.clone(), metrics.clone()));

        Self {
            carts: CartService::new(cart_store, catalog.clone()),
            catalog,
            orders,
            ledger,
            assembler: OrderAssembler::new(config.pricing.clone()),
            breaker: CircuitBreaker::new(config.order_store_breaker.clone()),
            order_locks: LockTable::new(),
            pending_cart_clears: Mutex::new(BTreeSet::new()),
            pending_restocks: Mutex::new(Vec::new()),
            config,
            metrics,
        }
    }

    pub fn ledger(&self) -> &Arc<StockLedger> {
        &self.ledger
    }

    pub fn carts(&self) -> &CartService {
        &self.carts
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    pub async fn create_order(
        &self,
        user_id: Uuid,
        items: Vec<CheckoutItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Order, CheckoutError> {
        let checkout = ValidatedCheckout::new(user_id, items, shipping_address)?;
        self.submit(checkout).await
    }

    /// Validate a raw client payload, then check it out
    pub async fn create_order_from_request(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let checkout = request.validate(user_id)?;
        self.submit(checkout).await
    }

    /// Check out whatever is in the user's cart
    pub async fn checkout_cart(
        &self,
        user_id: Uuid,
        shipping_address: ShippingAddress,
    ) -> Result<Order, CheckoutError> {
        let items = self.carts.items_for_checkout(user_id).await.map_err(|e| match e {
            CartError::Store(e) => CheckoutError::Unavailable(e),
            other => CheckoutError::Unavailable(StoreError::backend(other)),
        })?;
        self.create_order(user_id, items, shipping_address).await
    }

    pub async fn submit(&self, checkout: ValidatedCheckout) -> Result<Order, CheckoutError> {
        let mut saga = CheckoutSaga::new(checkout.user_id);

        let result = self.run(&mut saga, checkout).await;

        match &result {
            Ok(order) => {
                saga.advance(CheckoutState::Completed);
                tracing::info!(
                    checkout_id = %saga.id(),
                    order_id = %order.id,
                    user_id = %order.user_id,
                    total = %order.total_price,
                    "Checkout completed"
                );
                self.metrics.record_checkout("completed", saga.elapsed().as_secs_f64());
            }
            Err(e) => {
                saga.abort(e);
                self.metrics.record_checkout(e.kind(), saga.elapsed().as_secs_f64());
            }
        }

        result
    }

    async fn run(&self, saga: &mut CheckoutSaga, checkout: ValidatedCheckout) -> Result<Order, CheckoutError> {
        let ValidatedCheckout {
            user_id,
            items,
            shipping_address,
        } = checkout;

        // Validating: every product must exist
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            let product = self
                .catalog
                .get_product(item.product_id)
                .await
                .map_err(CheckoutError::Unavailable)?
                .ok_or(CheckoutError::ProductNotFound(item.product_id))?;
            resolved.push(ResolvedItem {
                product,
                size: item.size,
                quantity: item.quantity,
            });
        }

        if !self.breaker.allows_calls().await {
            self.metrics.record_circuit_rejection();
            return Err(CheckoutError::Aborted {
                state: saga.state(),
                reason: "order store circuit breaker is open".into(),
            });
        }

        // ReservingStock
        saga.advance(CheckoutState::ReservingStock);
        let requests: Vec<StockRequest> = resolved
            .iter()
            .map(|item| StockRequest::new(item.product.id, item.size.clone(), item.quantity))
            .collect();

        let reservation = self
            .ledger
            .decrement_atomic(&requests)
            .await
            .map_err(|e| match e {
                LedgerError::InsufficientStock(shortfalls) => CheckoutError::InsufficientStock(shortfalls),
                LedgerError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
                LedgerError::Store(e) => CheckoutError::Unavailable(e),
                other => CheckoutError::Aborted {
                    state: CheckoutState::ReservingStock,
                    reason: other.to_string(),
                },
            })?;

        // Pricing
        saga.advance(CheckoutState::Pricing);
        let order = self.assembler.assemble(user_id, &resolved, shipping_address);

        // Persisting
        saga.advance(CheckoutState::Persisting);
        self.persist(saga, &order, reservation).await?;

        // ClearingCart
        saga.advance(CheckoutState::ClearingCart);
        self.clear_cart_after_checkout(user_id).await;

        Ok(order)
    }

    async fn persist(&self, saga: &CheckoutSaga, order: &Order, reservation: Reservation) -> Result<(), CheckoutError> {
        let event = OrderEvent::placed(order, saga.id());
        let result = self.breaker.call(self.orders.insert(order, &event)).await;
        self.metrics.update_circuit_breaker_state(self.breaker.state().await);

        let error = match result {
            Ok(()) => {
                tracing::debug!(order_id = %order.id, event_id = %event.event_id, "Order persisted with outbox event");
                return Ok(());
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(order_id = %order.id, error = %e, "Order insert failed, releasing reserved stock");
                CheckoutError::Persistence(e)
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                self.metrics.record_circuit_rejection();
                CheckoutError::Aborted {
                    state: CheckoutState::Persisting,
                    reason: "order store circuit breaker is open".into(),
                }
            }
        };

        self.compensate(order, reservation.lines(), "persistence").await;
        Err(error)
    }

    /// Release stock on behalf of `order`. Never fails the caller: lines
    /// that cannot be put back are queued for `retry_pending_restocks`.
    async fn compensate(&self, order: &Order, lines: &[StockRequest], reason: &str) {
        match self.ledger.release(lines).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, reason = reason, "Stock restored");
                self.metrics.record_compensation(reason, true);
            }
            Err(e) => {
                let unreleased = match e {
                    LedgerError::ReleaseIncomplete { remaining } => remaining,
                    _ => lines.to_vec(),
                };
                tracing::error!(
                    order_id = %order.id,
                    reason = reason,
                    lines = unreleased.len(),
                    "Stock could not be fully restored, queued for retry"
                );
                self.metrics.record_compensation(reason, false);
                self.queue_restocks(unreleased).await;
            }
        }
    }

    async fn queue_restocks(&self, lines: Vec<StockRequest>) {
        let mut pending = self.pending_restocks.lock().await;
        pending.extend(lines);
        self.metrics.set_pending_restocks(pending.len());
    }

    /// Release every queued restock once. Returns how many lines were put
    /// back; the rest stay queued.
    pub async fn retry_pending_restocks(&self) -> usize {
        let queued = std::mem::take(&mut *self.pending_restocks.lock().await);
        if queued.is_empty() {
            return 0;
        }

        let mut restored = 0;
        let mut failed = Vec::new();
        for line in queued {
            match self.ledger.release(std::slice::from_ref(&line)).await {
                Ok(()) => {
                    restored += 1;
                    self.metrics.record_compensation("queued_restock", true);
                }
                Err(e) => {
                    tracing::warn!(line = %line, error = %e, "Queued restock failed again");
                    failed.push(line);
                }
            }
        }

        let still_pending = failed.len();
        self.queue_restocks(failed).await;
        tracing::info!(restored = restored, still_pending = still_pending, "Retried pending restocks");
        restored
    }

    pub async fn pending_restocks(&self) -> Vec<StockRequest> {
        self.pending_restocks.lock().await.clone()
    }

    async fn clear_cart_after_checkout(&self, user_id: Uuid) {
        let result = retry_with_backoff(self.config.follow_up_retry.clone(), |attempt| {
            if attempt > 1 {
                self.metrics.record_retry_attempt("cart_clear", attempt);
            }
            self.carts.clear(user_id)
        })
        .await
        .into_result();
        self.metrics.record_retry_outcome("cart_clear", result.is_ok());

        match result {
            Ok(()) => self.metrics.record_cart_clear("cleared"),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Cart clear failed, queued for retry");
                self.metrics.record_cart_clear("queued");
                let mut pending = self.pending_cart_clears.lock().await;
                pending.insert(user_id);
                self.metrics.set_pending_cart_clears(pending.len());
            }
        }
    }

    /// Try every queued cart clear once. Returns how many succeeded.
    pub async fn retry_pending_cart_clears(&self) -> usize {
        let queued: Vec<Uuid> = {
            let mut pending = self.pending_cart_clears.lock().await;
            std::mem::take(&mut *pending).into_iter().collect()
        };

        let mut cleared = 0;
        let mut failed = Vec::new();
        for user_id in queued {
            match self.carts.clear(user_id).await {
                Ok(()) => {
                    cleared += 1;
                    self.metrics.record_cart_clear("cleared_on_retry");
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Queued cart clear failed again");
                    failed.push(user_id);
                }
            }
        }

        let mut pending = self.pending_cart_clears.lock().await;
        pending.extend(failed);
        self.metrics.set_pending_cart_clears(pending.len());

        if cleared > 0 {
            tracing::info!(cleared = cleared, still_pending = pending.len(), "Retried pending cart clears");
        }
        cleared
    }

    pub async fn pending_cart_clears(&self) -> Vec<Uuid> {
        self.pending_cart_clears.lock().await.iter().copied().collect()
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.orders.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    /// Move an order along its lifecycle. Requesting the current status
    /// returns the order unchanged. Cancelling puts its stock back.
    pub async fn update_order_status(&self, id: Uuid, next: OrderStatus) -> Result<Order, OrderError> {
        let _held = self
            .order_locks
            .acquire_all([id], self.config.ledger.lock_timeout)
            .await
            .map_err(|_| OrderError::Busy(id))?;

        let mut order = self.get_order(id).await?;
        let from = order.status;

        if !order.transition_to(next)? {
            tracing::debug!(order_id = %id, status = %from, "Status unchanged");
            return Ok(order);
        }

        let event = OrderEvent::status_changed(&order, from, Uuid::now_v7());
        let result = self.breaker.call(self.orders.update_status(&order, &event)).await;
        self.metrics.update_circuit_breaker_state(self.breaker.state().await);
        match result {
            Ok(()) => {}
            Err(CircuitBreakerError::OperationFailed(e)) => return Err(OrderError::Store(e)),
            Err(CircuitBreakerError::CircuitOpen) => {
                return Err(OrderError::Store(StoreError::Unavailable(
                    "order store circuit breaker is open".into(),
                )))
            }
        }

        tracing::info!(order_id = %id, from = %from, to = %next, "Order status changed");
        self.metrics.record_status_transition(from.as_str(), next.as_str());

        if next == OrderStatus::Cancelled {
            self.compensate(&order, &order.stock_requests(), "cancellation").await;
        }

        Ok(order)
    }

    pub async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    pub async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage<Order>, OrderError> {
        Ok(self.orders.list(query).await?)
    }
}
