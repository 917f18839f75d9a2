use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::StockError;
use super::value_objects::{SizeLabel, SizeStock, StockKey, StockLevels};

// ============================================================================
// Product - catalog record as seen by the checkout core
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub stock: StockLevels,
}

impl Product {
    /// Product without sizes, tracked by a single counter
    pub fn flat(id: Uuid, title: impl Into<String>, price: Decimal, stock: u32) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            stock: StockLevels::Flat { stock },
        }
    }

    /// Product with one stock bucket per size
    pub fn sized<I, S>(id: Uuid, title: impl Into<String>, price: Decimal, sizes: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let sizes = sizes
            .into_iter()
            .map(|(size, stock)| SizeStock {
                size: SizeLabel::new(size),
                stock,
            })
            .collect();

        Self {
            id,
            title: title.into(),
            price,
            stock: StockLevels::Sized { sizes },
        }
    }

    pub fn uses_sizes(&self) -> bool {
        matches!(self.stock, StockLevels::Sized { .. })
    }

    /// Total units across every bucket
    pub fn aggregate_stock(&self) -> u64 {
        match &self.stock {
            StockLevels::Flat { stock } => u64::from(*stock),
            StockLevels::Sized { sizes } => sizes.iter().map(|s| u64::from(s.stock)).sum(),
        }
    }

    /// Units available in the bucket addressed by `size`.
    ///
    /// Returns `None` when the bucket does not exist: a size on a sizeless
    /// product, an unknown size, or no size on a sized product.
    pub fn available(&self, size: Option<&SizeLabel>) -> Option<u32> {
        match (&self.stock, size) {
            (StockLevels::Flat { stock }, None) => Some(*stock),
            (StockLevels::Sized { sizes }, Some(label)) => {
                sizes.iter().find(|s| &s.size == label).map(|s| s.stock)
            }
            _ => None,
        }
    }

    /// Take `quantity` units from a bucket. Returns the units left.
    pub fn decrement(&mut self, size: Option<&SizeLabel>, quantity: u32) -> Result<u32, StockError> {
        let key = self.key(size);
        let bucket = self
            .bucket_mut(size)
            .ok_or_else(|| StockError::MissingBucket(key.clone()))?;

        if *bucket < quantity {
            return Err(StockError::Insufficient {
                key,
                requested: quantity,
                available: *bucket,
            });
        }

        *bucket -= quantity;
        Ok(*bucket)
    }

    /// Put `quantity` units back into a bucket. Returns the new level.
    pub fn increment(&mut self, size: Option<&SizeLabel>, quantity: u32) -> Result<u32, StockError> {
        let key = self.key(size);
        let bucket = self
            .bucket_mut(size)
            .ok_or_else(|| StockError::MissingBucket(key.clone()))?;

        *bucket = bucket
            .checked_add(quantity)
            .ok_or(StockError::Overflow(key))?;
        Ok(*bucket)
    }

    fn key(&self, size: Option<&SizeLabel>) -> StockKey {
        StockKey::new(self.id, size.cloned())
    }

    fn bucket_mut(&mut self, size: Option<&SizeLabel>) -> Option<&mut u32> {
        match (&mut self.stock, size) {
            (StockLevels::Flat { stock }, None) => Some(stock),
            (StockLevels::Sized { sizes }, Some(label)) => sizes
                .iter_mut()
                .find(|s| &s.size == label)
                .map(|s| &mut s.stock),
            _ => None,
        }
    }
}
