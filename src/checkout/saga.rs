use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

// ============================================================================
// Checkout Saga
// ============================================================================
//
//   Validating -> ReservingStock -> Pricing -> Persisting -> ClearingCart -> Completed
//        \______________\_______________\__________\
//                                                   -> Aborted
//
// Once the order is persisted the checkout can no longer abort: a failed
// cart clear is queued as follow-up work instead.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Validating,
    ReservingStock,
    Pricing,
    Persisting,
    ClearingCart,
    Completed,
    Aborted,
}

impl CheckoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Validating => "validating",
            CheckoutState::ReservingStock => "reserving_stock",
            CheckoutState::Pricing => "pricing",
            CheckoutState::Persisting => "persisting",
            CheckoutState::ClearingCart => "clearing_cart",
            CheckoutState::Completed => "completed",
            CheckoutState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Completed | CheckoutState::Aborted)
    }

    /// The order has not been committed yet
    pub fn can_abort(&self) -> bool {
        matches!(
            self,
            CheckoutState::Validating
                | CheckoutState::ReservingStock
                | CheckoutState::Pricing
                | CheckoutState::Persisting
        )
    }

    pub fn can_advance_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        match (self, next) {
            (Validating, ReservingStock)
            | (ReservingStock, Pricing)
            | (Pricing, Persisting)
            | (Persisting, ClearingCart)
            | (ClearingCart, Completed) => true,
            (from, Aborted) => from.can_abort(),
            _ => false,
        }
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one checkout. The id doubles as the correlation id of the
/// events it produces.
#[derive(Debug)]
pub struct CheckoutSaga {
    id: Uuid,
    user_id: Uuid,
    state: CheckoutState,
    history: Vec<CheckoutState>,
    started: Instant,
}

impl CheckoutSaga {
    pub fn new(user_id: Uuid) -> Self {
        let id = Uuid::now_v7();
        tracing::debug!(checkout_id = %id, user_id = %user_id, "Checkout started");
        Self {
            id,
            user_id,
            state: CheckoutState::Validating,
            history: vec![CheckoutState::Validating],
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn history(&self) -> &[CheckoutState] {
        &self.history
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Move to `next`. Returns false, leaving the saga as it was, when the
    /// step is not allowed from the current state.
    pub fn advance(&mut self, next: CheckoutState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                checkout_id = %self.id,
                from = %self.state,
                to = %next,
                "Rejected checkout state transition"
            );
            return false;
        }

        tracing::debug!(
            checkout_id = %self.id,
            user_id = %self.user_id,
            from = %self.state,
            to = %next,
            "Checkout state transition"
        );
        self.state = next;
        self.history.push(next);
        true
    }

    /// Record the end of the checkout as `Aborted`, keeping the step it
    /// failed in. Returns that step.
    pub fn abort(&mut self, reason: &dyn fmt::Display) -> CheckoutState {
        let failed_in = self.state;
        if self.advance(CheckoutState::Aborted) {
            tracing::info!(
                checkout_id = %self.id,
                user_id = %self.user_id,
                failed_in = %failed_in,
                reason = %reason,
                "Checkout aborted"
            );
        }
        failed_in
    }
}
