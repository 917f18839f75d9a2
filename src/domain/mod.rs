// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with value objects, errors and
// the aggregate itself. Persistence lives behind the ports in `store`.
//
// ============================================================================

pub mod catalog;
pub mod cart;
pub mod order;
