use rust_decimal::Decimal;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use storefront_checkout::checkout::{CheckoutError, CheckoutItem, CheckoutService};
use storefront_checkout::config::{AppConfig, StorageBackend};
use storefront_checkout::domain::catalog::{Product, SizeLabel};
use storefront_checkout::domain::order::{OrderQuery, OrderStatus, ShippingAddress};
use storefront_checkout::metrics::{self, Metrics};
use storefront_checkout::store::scylla::{ensure_schema, ScyllaCartStore, ScyllaOrderStore};
use storefront_checkout::store::{
    CartStore, CatalogStore, InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore, OrderStore,
};

const ORDER_TOPIC: &str = "order-events";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront_checkout=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(storage = ?config.storage, "Starting storefront checkout engine");

    // === 1. Metrics registry and /metrics endpoint ===
    let metrics = Arc::new(Metrics::new()?);
    let registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let result = actix_web::rt::System::new()
            .block_on(metrics::start_metrics_server(registry, metrics_port));
        if let Err(e) = result {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 2. Stores ===
    let catalog = Arc::new(InMemoryCatalog::new());
    let (carts, orders): (Arc<dyn CartStore>, Arc<dyn OrderStore>) = match config.storage {
        StorageBackend::Memory => (
            Arc::new(InMemoryCartStore::new()),
            Arc::new(InMemoryOrderStore::new(ORDER_TOPIC)),
        ),
        StorageBackend::Scylla => {
            tracing::info!(node = %config.scylla.node, "Connecting to ScyllaDB...");
            let session: Session = SessionBuilder::new()
                .known_node(&config.scylla.node)
                .build()
                .await?;
            ensure_schema(&session, &config.scylla.keyspace).await?;
            let session = Arc::new(session);
            (
                Arc::new(ScyllaCartStore::new(session.clone())),
                Arc::new(ScyllaOrderStore::new(session, ORDER_TOPIC)),
            )
        }
    };

    let service = CheckoutService::new(catalog.clone(), carts, orders, config.checkout_config(), metrics.clone());

    // === 3. Demo catalog ===
    let jacket = Product::sized(
        Uuid::new_v4(),
        "Rain Jacket",
        Decimal::new(12000, 2),
        [("S", 2), ("M", 5), ("L", 1)],
    );
    let tote = Product::flat(Uuid::new_v4(), "Canvas Tote", Decimal::new(1500, 2), 10);
    for product in [jacket.clone(), tote.clone()] {
        catalog.put_product(product).await?;
    }

    // === 4. Cart -> checkout -> status changes ===
    let user_id = Uuid::new_v4();
    let address = ShippingAddress {
        name: "Demo Shopper".into(),
        address: "1 Market Street".into(),
        city: "Springfield".into(),
        postal_code: "12345".into(),
        country: "US".into(),
        phone: "555-0100".into(),
    };

    service
        .carts()
        .upsert(user_id, jacket.id, Some(SizeLabel::new("M")), 1)
        .await?;
    service.carts().upsert(user_id, tote.id, None, 2).await?;

    let order = service.checkout_cart(user_id, address.clone()).await?;
    tracing::info!(
        order_id = %order.id,
        items = %order.items_price,
        shipping = %order.shipping_price,
        total = %order.total_price,
        "Order placed from cart"
    );

    // More size L than exists: rejected, nothing reserved
    let oversized = vec![CheckoutItem::new(jacket.id, Some(SizeLabel::new("L")), 3)];
    match service.create_order(user_id, oversized, address).await {
        Err(CheckoutError::InsufficientStock(shortfalls)) => {
            for shortfall in shortfalls {
                tracing::info!(shortfall = %shortfall, "Checkout rejected");
            }
        }
        other => tracing::warn!(result = ?other.map(|o| o.id), "Unexpected checkout result"),
    }

    let shipped = service.update_order_status(order.id, OrderStatus::Shipped).await?;
    let cancelled = service.update_order_status(shipped.id, OrderStatus::Cancelled).await?;
    tracing::info!(order_id = %cancelled.id, status = %cancelled.status, "Order cancelled, stock restored");

    let page = service.list_orders(&OrderQuery::default()).await?;
    tracing::info!(orders = page.total, pages = page.pages, "Order listing");

    let retried = service.retry_pending_cart_clears().await;
    let restocked = service.retry_pending_restocks().await;
    let pruned = service.ledger().prune_locks();
    tracing::info!(retried = retried, restocked = restocked, pruned_locks = pruned, "Demo complete");

    Ok(())
}
