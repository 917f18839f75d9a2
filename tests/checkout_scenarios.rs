mod support;

use rust_decimal::Decimal;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use storefront_checkout::checkout::{
    CheckoutConfig, CheckoutError, CheckoutItem, CheckoutRequest, CheckoutService, CheckoutState, ValidationError,
};
use storefront_checkout::domain::catalog::{Product, StockKey};
use storefront_checkout::domain::order::{OrderError, OrderQuery, OrderStatus};
use storefront_checkout::ledger::LedgerConfig;
use storefront_checkout::metrics::Metrics;
use storefront_checkout::store::{CatalogStore, InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore};
use storefront_checkout::utils::CircuitState;

use support::{
    address, dec, quick_retry, size, test_config, FailingOrderStore, Harness, RestockRefusingCatalog, SlowCatalog,
};

fn tee(stock_m: u32) -> Product {
    Product::sized(Uuid::new_v4(), "Logo Tee", dec("25"), [("S", 4), ("M", stock_m), ("L", 3)])
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_of_the_last_units_sell_once() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 3)], address())
                .await
        }));
    }

    let mut placed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientStock(shortfalls)) => {
                assert_eq!(shortfalls[0].available, 2);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((placed, rejected), (1, 1));
    assert_eq!(h.stock(id, Some("M")).await, 2);
    assert_eq!(h.orders.inner.order_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_checkouts_never_drive_stock_negative() {
    let jacket = Product::sized(Uuid::new_v4(), "Jacket", dec("120"), [("M", 7)]);
    let tote = Product::flat(Uuid::new_v4(), "Tote", dec("15"), 9);
    let (jacket_id, tote_id) = (jacket.id, tote.id);
    let h = Harness::new(vec![jacket, tote]).await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let service = h.service.clone();
        // alternate key order so batches overlap in both directions
        let items = if i % 2 == 0 {
            vec![CheckoutItem::new(jacket_id, size("M"), 1), CheckoutItem::new(tote_id, None, 2)]
        } else {
            vec![CheckoutItem::new(tote_id, None, 2), CheckoutItem::new(jacket_id, size("M"), 1)]
        };
        handles.push(tokio::spawn(async move {
            service.create_order(Uuid::new_v4(), items, address()).await
        }));
    }

    let mut placed = 0u32;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            placed += 1;
        }
    }

    // tote runs out first: 9 / 2 = 4 orders
    assert_eq!(placed, 4);
    assert_eq!(h.stock(tote_id, None).await, 1);
    assert_eq!(h.stock(jacket_id, Some("M")).await, 3);
}

// ============================================================================
// Pricing and persistence
// ============================================================================

#[tokio::test]
async fn order_totals_use_flat_shipping_below_threshold() {
    let a = Product::flat(Uuid::new_v4(), "A", dec("10"), 5);
    let b = Product::flat(Uuid::new_v4(), "B", dec("30"), 5);
    let (a_id, b_id) = (a.id, b.id);
    let h = Harness::new(vec![a, b]).await;

    let order = h
        .service
        .create_order(
            Uuid::new_v4(),
            vec![CheckoutItem::new(a_id, None, 2), CheckoutItem::new(b_id, None, 1)],
            address(),
        )
        .await
        .unwrap();

    assert_eq!(order.items_price, dec("50"));
    assert_eq!(order.shipping_price, dec("50"));
    assert_eq!(order.tax_price, Decimal::ZERO);
    assert_eq!(order.total_price, dec("100"));
    assert_eq!(order.status, OrderStatus::Confirmed);

    let stored = h.service.get_order(order.id).await.unwrap();
    assert_eq!(stored, order);

    let outbox = h.orders.inner.outbox_messages().await;
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].aggregate_id, order.id);
}

#[tokio::test]
async fn persistence_failure_restores_reserved_stock() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;
    h.orders.failing.store(true, Ordering::SeqCst);

    let err = h
        .service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 2)], address())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Persistence(_)));
    assert_eq!(h.stock(id, Some("M")).await, 5);
    assert_eq!(h.orders.inner.order_count().await, 0);
}

#[tokio::test]
async fn open_circuit_aborts_before_touching_stock() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;
    h.orders.failing.store(true, Ordering::SeqCst);

    // failure_threshold is 2 in the test config
    for _ in 0..2 {
        let _ = h
            .service
            .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 1)], address())
            .await;
    }
    assert_eq!(h.service.breaker().state().await, CircuitState::Open);
    let inserts_before = h.orders.insert_calls.load(Ordering::SeqCst);

    let err = h
        .service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 1)], address())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Aborted {
            state: CheckoutState::Validating,
            ..
        }
    ));
    assert_eq!(h.orders.insert_calls.load(Ordering::SeqCst), inserts_before);
    assert_eq!(h.stock(id, Some("M")).await, 5);
}

// ============================================================================
// Rejections without side effects
// ============================================================================

#[tokio::test]
async fn product_deleted_mid_flight_is_not_found() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;
    let user_id = Uuid::new_v4();

    h.service.carts().upsert(user_id, id, size("M"), 2).await.unwrap();
    h.catalog.remove_product(id).await.unwrap();

    let err = h.service.checkout_cart(user_id, address()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::ProductNotFound(missing) if missing == id));

    let cart = h.service.carts().get_or_create(user_id).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(h.orders.inner.order_count().await, 0);
}

#[tokio::test]
async fn shortfall_in_one_line_rejects_the_whole_checkout() {
    let product = tee(5);
    let mug = Product::flat(Uuid::new_v4(), "Mug", dec("8"), 1);
    let (id, mug_id) = (product.id, mug.id);
    let h = Harness::new(vec![product, mug]).await;

    let err = h
        .service
        .create_order(
            Uuid::new_v4(),
            vec![CheckoutItem::new(id, size("M"), 2), CheckoutItem::new(mug_id, None, 2)],
            address(),
        )
        .await
        .unwrap_err();

    let CheckoutError::InsufficientStock(shortfalls) = err else {
        panic!("expected insufficient stock");
    };
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0].key, StockKey::new(mug_id, None));
    assert_eq!((shortfalls[0].requested, shortfalls[0].available), (2, 1));

    assert_eq!(h.stock(id, Some("M")).await, 5);
    assert_eq!(h.stock(mug_id, None).await, 1);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_lookup() {
    let h = Harness::new(vec![]).await;

    let err = h
        .service
        .create_order(Uuid::new_v4(), vec![], address())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(ValidationError::NoItems)));

    let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
        "items": [{ "productId": Uuid::new_v4().to_string(), "quantity": "lots" }],
        "shippingAddress": { "name": "K" }
    }))
    .unwrap();
    let err = h
        .service
        .create_order_from_request(Uuid::new_v4(), request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::InvalidQuantity { index: 0, .. })
    ));
}

#[tokio::test]
async fn size_specific_checkout_touches_only_that_size() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;

    h.service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("L"), 2)], address())
        .await
        .unwrap();

    assert_eq!(h.stock(id, Some("L")).await, 1);
    assert_eq!(h.stock(id, Some("M")).await, 5);
    assert_eq!(h.stock(id, Some("S")).await, 4);
    assert_eq!(h.product(id).await.aggregate_stock(), 10);
}

#[tokio::test]
async fn lock_timeout_aborts_with_no_side_effects() {
    let product = tee(5);
    let id = product.id;
    let catalog = Arc::new(SlowCatalog {
        inner: InMemoryCatalog::with_products(vec![product]).await,
        delay: Duration::from_millis(300),
    });
    let config = CheckoutConfig {
        ledger: LedgerConfig {
            lock_timeout: Duration::from_millis(50),
            retry: quick_retry(),
        },
        ..test_config()
    };
    let service = Arc::new(CheckoutService::new(
        catalog.clone(),
        Arc::new(InMemoryCartStore::new()),
        Arc::new(InMemoryOrderStore::default()),
        config,
        Arc::new(Metrics::new().unwrap()),
    ));

    // the first checkout holds the M lock while its decrement is in flight
    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 1)], address())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = service
        .create_order(
            Uuid::new_v4(),
            vec![CheckoutItem::new(id, size("S"), 1), CheckoutItem::new(id, size("M"), 2)],
            address(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Aborted {
            state: CheckoutState::ReservingStock,
            ..
        }
    ));

    first.await.unwrap().unwrap();
    let product = catalog.get_product(id).await.unwrap().unwrap();
    assert_eq!(product.available(size("M").as_ref()), Some(4));
    assert_eq!(product.available(size("S").as_ref()), Some(4));
}

// ============================================================================
// Compensation
// ============================================================================

#[tokio::test]
async fn compensation_waits_out_lock_contention() {
    let product = Product::sized(
        Uuid::new_v4(),
        "Logo Tee",
        dec("25"),
        [("S", 5), ("M", 10), ("L", 5), ("XL", 5)],
    );
    let id = product.id;
    let catalog = Arc::new(SlowCatalog {
        inner: InMemoryCatalog::with_products(vec![product]).await,
        delay: Duration::from_millis(300),
    });
    let config = CheckoutConfig {
        ledger: LedgerConfig {
            lock_timeout: Duration::from_millis(500),
            retry: quick_retry(),
        },
        ..test_config()
    };
    let service = Arc::new(CheckoutService::new(
        catalog.clone(),
        Arc::new(InMemoryCartStore::new()),
        Arc::new(FailingOrderStore::new(true)),
        config,
        Arc::new(Metrics::new().unwrap()),
    ));

    // reserves 2 x M, then fails to persist and has to give them back
    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 2)], address())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // queued on M behind the first checkout, then holds it through four
    // slow decrements, longer than two lock timeouts
    let second = {
        let service = service.clone();
        tokio::spawn(async move {
            let items = ["M", "S", "L", "XL"]
                .into_iter()
                .map(|label| CheckoutItem::new(id, size(label), 1))
                .collect();
            service.create_order(Uuid::new_v4(), items, address()).await
        })
    };

    assert!(matches!(first.await.unwrap(), Err(CheckoutError::Persistence(_))));
    assert!(matches!(second.await.unwrap(), Err(CheckoutError::Persistence(_))));

    let product = catalog.get_product(id).await.unwrap().unwrap();
    assert_eq!(product.available(size("M").as_ref()), Some(10));
    assert_eq!(product.available(size("S").as_ref()), Some(5));
    assert_eq!(product.available(size("L").as_ref()), Some(5));
    assert_eq!(product.available(size("XL").as_ref()), Some(5));
    assert!(service.pending_restocks().await.is_empty());
}

async fn stock_m(catalog: &RestockRefusingCatalog, id: Uuid) -> Option<u32> {
    catalog.get_product(id).await.unwrap().unwrap().available(size("M").as_ref())
}

#[tokio::test]
async fn refused_restock_on_cancel_is_queued_and_retried() {
    let product = tee(5);
    let id = product.id;
    let catalog = Arc::new(RestockRefusingCatalog {
        inner: InMemoryCatalog::with_products(vec![product]).await,
        failing_increments: Default::default(),
    });
    let metrics = Arc::new(Metrics::new().unwrap());
    let service = CheckoutService::new(
        catalog.clone(),
        Arc::new(InMemoryCartStore::new()),
        Arc::new(InMemoryOrderStore::default()),
        test_config(),
        metrics.clone(),
    );

    let order = service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 2)], address())
        .await
        .unwrap();
    assert_eq!(stock_m(&catalog, id).await, Some(3));

    catalog.failing_increments.store(true, Ordering::SeqCst);
    let cancelled = service.update_order_status(order.id, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_m(&catalog, id).await, Some(3));
    assert_eq!(service.pending_restocks().await.len(), 1);
    assert_eq!(metrics.pending_restocks.get(), 1);

    assert_eq!(service.retry_pending_restocks().await, 0);
    assert_eq!(service.pending_restocks().await.len(), 1);

    catalog.failing_increments.store(false, Ordering::SeqCst);
    assert_eq!(service.retry_pending_restocks().await, 1);
    assert_eq!(stock_m(&catalog, id).await, Some(5));
    assert!(service.pending_restocks().await.is_empty());
    assert_eq!(metrics.pending_restocks.get(), 0);
}

// ============================================================================
// Cart follow-up
// ============================================================================

#[tokio::test]
async fn checkout_from_cart_clears_it() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;
    let user_id = Uuid::new_v4();

    h.service.carts().upsert(user_id, id, size("S"), 2).await.unwrap();
    let order = h.service.checkout_cart(user_id, address()).await.unwrap();

    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].quantity, 2);
    assert!(h.service.carts().get_or_create(user_id).await.unwrap().is_empty());
    assert_eq!(h.stock(id, Some("S")).await, 2);
}

#[tokio::test]
async fn failed_cart_clear_keeps_order_and_is_retried_later() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;
    let user_id = Uuid::new_v4();

    h.service.carts().upsert(user_id, id, size("M"), 1).await.unwrap();
    h.carts.failing.store(true, Ordering::SeqCst);

    let order = h.service.checkout_cart(user_id, address()).await.unwrap();
    assert_eq!(h.service.get_order(order.id).await.unwrap().id, order.id);
    assert_eq!(h.service.pending_cart_clears().await, vec![user_id]);

    // still failing: stays queued
    assert_eq!(h.service.retry_pending_cart_clears().await, 0);
    assert_eq!(h.service.pending_cart_clears().await, vec![user_id]);

    h.carts.failing.store(false, Ordering::SeqCst);
    assert_eq!(h.service.retry_pending_cart_clears().await, 1);
    assert!(h.service.pending_cart_clears().await.is_empty());
    assert!(h.service.carts().get_or_create(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() {
    let h = Harness::new(vec![]).await;
    let err = h.service.checkout_cart(Uuid::new_v4(), address()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(ValidationError::NoItems)));
}

// ============================================================================
// Order status
// ============================================================================

#[tokio::test]
async fn status_moves_forward_and_same_status_is_a_no_op() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;

    let order = h
        .service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 1)], address())
        .await
        .unwrap();

    let unchanged = h.service.update_order_status(order.id, OrderStatus::Confirmed).await.unwrap();
    assert_eq!(unchanged, order);

    let shipped = h.service.update_order_status(order.id, OrderStatus::Shipped).await.unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    let delivered = h.service.update_order_status(order.id, OrderStatus::Delivered).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let err = h
        .service
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidStatus {
            from: OrderStatus::Delivered,
            to: OrderStatus::Confirmed
        }
    ));
    assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Delivered);

    // one placed event plus two status changes
    assert_eq!(h.orders.inner.outbox_messages().await.len(), 3);
}

#[tokio::test]
async fn cancellation_restocks_once() {
    let product = tee(5);
    let id = product.id;
    let h = Harness::new(vec![product]).await;

    let order = h
        .service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 3)], address())
        .await
        .unwrap();
    assert_eq!(h.stock(id, Some("M")).await, 2);

    let first = h.service.clone();
    let second = h.service.clone();
    let (a, b) = tokio::join!(
        first.update_order_status(order.id, OrderStatus::Cancelled),
        second.update_order_status(order.id, OrderStatus::Cancelled),
    );
    assert_eq!(a.unwrap().status, OrderStatus::Cancelled);
    assert_eq!(b.unwrap().status, OrderStatus::Cancelled);

    assert_eq!(h.stock(id, Some("M")).await, 5);
}

#[tokio::test]
async fn unknown_order() {
    let h = Harness::new(vec![]).await;
    let missing = Uuid::new_v4();

    let err = h.service.get_order(missing).await.unwrap_err();
    assert!(matches!(err, OrderError::NotFound(id) if id == missing));

    let err = h
        .service
        .update_order_status(missing, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn orders_are_listed_per_user_and_paginated() {
    let product = Product::flat(Uuid::new_v4(), "Sticker", dec("2"), 100);
    let id = product.id;
    let h = Harness::new(vec![product]).await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let mut alice_orders = Vec::new();
    for _ in 0..3 {
        let order = h
            .service
            .create_order(alice, vec![CheckoutItem::new(id, None, 1)], address())
            .await
            .unwrap();
        alice_orders.push(order.id);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let bob_order = h
        .service
        .create_order(bob, vec![CheckoutItem::new(id, None, 1)], address())
        .await
        .unwrap();
    h.service.update_order_status(bob_order.id, OrderStatus::Shipped).await.unwrap();

    let mine = h.service.orders_for_user(alice).await.unwrap();
    assert_eq!(mine.len(), 3);
    assert_eq!(mine[0].id, alice_orders[2]);

    let page = h
        .service
        .list_orders(&OrderQuery {
            status: None,
            page: 2,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!((page.total, page.pages, page.items.len()), (4, 2, 1));

    let shipped = h
        .service
        .list_orders(&OrderQuery {
            status: Some(OrderStatus::Shipped),
            ..OrderQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(shipped.items.len(), 1);
    assert_eq!(shipped.items[0].id, bob_order.id);
}

#[tokio::test]
async fn checkout_metrics_are_recorded() {
    let product = tee(1);
    let id = product.id;
    let h = Arc::new(Harness::new(vec![product]).await);

    h.service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 1)], address())
        .await
        .unwrap();
    let _ = h
        .service
        .create_order(Uuid::new_v4(), vec![CheckoutItem::new(id, size("M"), 1)], address())
        .await;

    let completed = h.metrics.checkouts_total.with_label_values(&["completed"]).get();
    let rejected = h.metrics.checkouts_total.with_label_values(&["insufficient_stock"]).get();
    assert_eq!((completed, rejected), (1, 1));
}
