// ============================================================================
// Catalog Domain - Products and their stock counters
// ============================================================================
//
// The catalog itself is an external collaborator. This module only holds
// the shapes the checkout core reads and the checked stock arithmetic the
// stores apply.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod product;

pub use value_objects::*;
pub use errors::*;
pub use product::*;
