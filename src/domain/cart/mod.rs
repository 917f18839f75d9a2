// ============================================================================
// Cart Domain - per-user staging list ahead of checkout
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod service;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use service::*;
