mod assembler;

pub use assembler::{OrderAssembler, PriceBreakdown, PricingConfig, ResolvedItem};
