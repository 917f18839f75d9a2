// ============================================================================
// Checkout - turns a cart or an item list into a confirmed order
// ============================================================================
//
// - request/      - raw client payloads and their validation
// - saga/         - checkout state machine
// - orchestrator/ - CheckoutService, the entry point for checkouts and
//                   order status changes
//
// ============================================================================

mod errors;
mod orchestrator;
mod request;
mod saga;

pub use errors::{CheckoutError, ValidationError};
pub use orchestrator::{CheckoutConfig, CheckoutService};
pub use request::{
    CheckoutItem, CheckoutRequest, QuantityInput, RawCheckoutItem, RawShippingAddress, ValidatedCheckout,
};
pub use saga::{CheckoutSaga, CheckoutState};
