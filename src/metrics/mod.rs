// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

use crate::utils::CircuitState;

// ============================================================================
// Metrics Module - Prometheus metrics for the checkout engine
// ============================================================================
//
// - Checkout outcomes and latency
// - Stock reservations and compensations
// - Follow-up work (cart clears, restocks)
// - Order status transitions
// - Retry attempts and circuit breaker state
//
// Scraped via /metrics on the actix-web server in `server.rs`.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub checkouts_total: IntCounterVec,
    pub checkout_duration: HistogramVec,

    pub stock_reservations: IntCounterVec,
    pub stock_compensations: IntCounterVec,

    pub cart_clear_followups: IntCounterVec,
    pub pending_cart_clears: IntGauge,
    pub pending_restocks: IntGauge,

    pub order_status_transitions: IntCounterVec,

    pub retry_attempts_total: IntCounterVec,
    pub retry_outcomes: IntCounterVec,

    pub circuit_breaker_state: IntGauge,
    pub circuit_breaker_rejections: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let checkouts_total = IntCounterVec::new(
            Opts::new("checkouts_total", "Checkouts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(checkouts_total.clone()))?;

        let checkout_duration = HistogramVec::new(
            HistogramOpts::new("checkout_duration_seconds", "Checkout duration by outcome")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(checkout_duration.clone()))?;

        let stock_reservations = IntCounterVec::new(
            Opts::new("stock_reservations_total", "Atomic stock reservations by result"),
            &["result"],
        )?;
        registry.register(Box::new(stock_reservations.clone()))?;

        let stock_compensations = IntCounterVec::new(
            Opts::new("stock_compensations_total", "Compensating stock increments by reason and result"),
            &["reason", "result"],
        )?;
        registry.register(Box::new(stock_compensations.clone()))?;

        let cart_clear_followups = IntCounterVec::new(
            Opts::new("cart_clear_followups_total", "Post-checkout cart clears by result"),
            &["result"],
        )?;
        registry.register(Box::new(cart_clear_followups.clone()))?;

        let pending_cart_clears = IntGauge::new(
            "pending_cart_clears",
            "Users whose cart still has to be cleared after checkout",
        )?;
        registry.register(Box::new(pending_cart_clears.clone()))?;

        let pending_restocks = IntGauge::new(
            "pending_restocks",
            "Stock lines released by a compensation but not yet put back",
        )?;
        registry.register(Box::new(pending_restocks.clone()))?;

        let order_status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_status_transitions.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_outcomes = IntCounterVec::new(
            Opts::new("retry_outcomes_total", "Retried operations by final outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(retry_outcomes.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "order_store_circuit_state",
            "Order store circuit breaker state (0=Closed, 1=HalfOpen, 2=Open)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_rejections = IntCounter::new(
            "order_store_circuit_rejections_total",
            "Checkouts refused because the order store circuit was open",
        )?;
        registry.register(Box::new(circuit_breaker_rejections.clone()))?;

        Ok(Self {
            registry,
            checkouts_total,
            checkout_duration,
            stock_reservations,
            stock_compensations,
            cart_clear_followups,
            pending_cart_clears,
            pending_restocks,
            order_status_transitions,
            retry_attempts_total,
            retry_outcomes,
            circuit_breaker_state,
            circuit_breaker_rejections,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_checkout(&self, outcome: &str, duration_secs: f64) {
        self.checkouts_total.with_label_values(&[outcome]).inc();
        self.checkout_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    pub fn record_reservation(&self, result: &str) {
        self.stock_reservations.with_label_values(&[result]).inc();
    }

    pub fn record_compensation(&self, reason: &str, success: bool) {
        let result = if success { "restored" } else { "incomplete" };
        self.stock_compensations.with_label_values(&[reason, result]).inc();
    }

    pub fn record_cart_clear(&self, result: &str) {
        self.cart_clear_followups.with_label_values(&[result]).inc();
    }

    pub fn set_pending_cart_clears(&self, pending: usize) {
        self.pending_cart_clears.set(pending as i64);
    }

    pub fn set_pending_restocks(&self, pending: usize) {
        self.pending_restocks.set(pending as i64);
    }

    pub fn record_status_transition(&self, from_status: &str, to_status: &str) {
        self.order_status_transitions.with_label_values(&[from_status, to_status]).inc();
    }

    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.retry_outcomes.with_label_values(&[operation, outcome]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: CircuitState) {
        self.circuit_breaker_state.set(state.as_gauge());
    }

    pub fn record_circuit_rejection(&self) {
        self.circuit_breaker_rejections.inc();
    }
}
