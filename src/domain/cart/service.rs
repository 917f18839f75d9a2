use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::checkout::CheckoutItem;
use crate::domain::catalog::{SizeLabel, StockKey};
use crate::store::{CartStore, CatalogStore};
use super::aggregate::Cart;
use super::errors::CartError;
use super::value_objects::CartChange;

// ============================================================================
// Cart Service
// ============================================================================
//
// Orchestrates: Catalog lookup -> advisory stock check -> Cart -> Cart store
//
// Stock is only checked here, never reserved. Checkout re-validates it.
//
// ============================================================================

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { carts, catalog }
    }

    pub async fn get_or_create(&self, user_id: Uuid) -> Result<Cart, CartError> {
        if let Some(cart) = self.carts.load(user_id).await? {
            return Ok(cart);
        }

        let cart = Cart::new(user_id);
        self.carts.save(&cart).await?;
        tracing::debug!(user_id = %user_id, "Created empty cart");
        Ok(cart)
    }

    /// Create, update or (quantity 0) remove the `(product_id, size)` line.
    ///
    /// Removal skips the catalog, so lines of products that have since been
    /// deleted can still be dropped.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        size: Option<SizeLabel>,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        let price = if quantity == 0 {
            Decimal::ZERO
        } else {
            let product = self
                .catalog
                .get_product(product_id)
                .await?
                .ok_or(CartError::ProductNotFound(product_id))?;

            let available = product.available(size.as_ref()).unwrap_or(0);
            if available < quantity {
                return Err(CartError::InsufficientStock {
                    key: StockKey::new(product_id, size),
                    requested: quantity,
                    available,
                });
            }
            product.price
        };

        let mut cart = self.get_or_create(user_id).await?;
        let change = cart.set_line(product_id, size, quantity, price);

        if change != CartChange::Unchanged {
            self.carts.save(&cart).await?;
        }

        tracing::debug!(
            user_id = %user_id,
            product_id = %product_id,
            quantity = quantity,
            change = ?change,
            "Cart line upserted"
        );

        Ok(cart)
    }

    /// The cart's lines as checkout input
    pub async fn items_for_checkout(&self, user_id: Uuid) -> Result<Vec<CheckoutItem>, CartError> {
        let cart = self.carts.load(user_id).await?;
        Ok(cart
            .map(|cart| {
                cart.lines
                    .iter()
                    .map(|line| CheckoutItem::new(line.product_id, line.size.clone(), line.quantity))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Empty the user's cart. Safe to repeat.
    pub async fn clear(&self, user_id: Uuid) -> Result<(), CartError> {
        let mut cart = match self.carts.load(user_id).await? {
            Some(cart) => cart,
            None => Cart::new(user_id),
        };
        cart.clear();
        self.carts.save(&cart).await?;
        Ok(())
    }
}
