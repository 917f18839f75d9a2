use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Catalog Value Objects
// ============================================================================

/// Size label as carried by the catalog ("M", "XL", "32", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeLabel(String);

impl SizeLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one stock counter: a size bucket of a product, or the
/// product's flat stock when it carries no sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: Uuid,
    pub size: Option<SizeLabel>,
}

impl StockKey {
    pub fn new(product_id: Uuid, size: Option<SizeLabel>) -> Self {
        Self { product_id, size }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.size {
            Some(size) => write!(f, "{}/{}", self.product_id, size),
            None => write!(f, "{}", self.product_id),
        }
    }
}

/// Requested change of one stock counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub key: StockKey,
    pub quantity: u32,
}

impl StockRequest {
    pub fn new(product_id: Uuid, size: Option<SizeLabel>, quantity: u32) -> Self {
        Self {
            key: StockKey::new(product_id, size),
            quantity,
        }
    }
}

impl fmt::Display for StockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.key, self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub size: SizeLabel,
    pub stock: u32,
}

/// Stock held by a product. Sized products only ever carry per-size
/// buckets; the aggregate is always derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockLevels {
    Flat { stock: u32 },
    Sized { sizes: Vec<SizeStock> },
}
