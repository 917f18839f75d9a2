// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderLine, ShippingAddress, OrderStatus, OrderQuery)
// - Events (OrderPlaced, OrderStatusChanged)
// - Errors (OrderError enum)
// - Aggregate (Order with its status state machine)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use errors::*;
pub use aggregate::*;
