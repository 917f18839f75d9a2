use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::SizeLabel;
use crate::domain::order::ShippingAddress;
use super::errors::ValidationError;

// ============================================================================
// Checkout Input
// ============================================================================
//
// Client payloads arrive loosely typed: ids as strings, quantities as
// numbers or numeric strings, fields possibly absent. `CheckoutRequest`
// mirrors that shape and `validate` turns it into a `ValidatedCheckout`,
// the only input the saga accepts.
//
// ============================================================================

/// A quantity as sent by a client: `2`, `2.0` or `"2"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Number(i64),
    Float(f64),
    Text(String),
}

impl QuantityInput {
    fn parse(&self) -> Option<u32> {
        let value = match self {
            QuantityInput::Number(n) => *n,
            QuantityInput::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
            QuantityInput::Float(_) => return None,
            QuantityInput::Text(s) => s.trim().parse::<i64>().ok()?,
        };
        u32::try_from(value).ok().filter(|q| *q >= 1)
    }

    fn raw(&self) -> String {
        match self {
            QuantityInput::Number(n) => n.to_string(),
            QuantityInput::Float(f) => f.to_string(),
            QuantityInput::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckoutItem {
    #[serde(alias = "product")]
    pub product_id: Option<String>,
    pub size: Option<String>,
    pub quantity: Option<QuantityInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawShippingAddress {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Option<Vec<RawCheckoutItem>>,
    pub shipping_address: Option<RawShippingAddress>,
}

/// One line of a checkout, already validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub size: Option<SizeLabel>,
    pub quantity: u32,
}

impl CheckoutItem {
    pub fn new(product_id: Uuid, size: Option<SizeLabel>, quantity: u32) -> Self {
        Self {
            product_id,
            size,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCheckout {
    pub user_id: Uuid,
    pub items: Vec<CheckoutItem>,
    pub shipping_address: ShippingAddress,
}

impl ValidatedCheckout {
    /// Check the preconditions on already-typed input
    pub fn new(
        user_id: Uuid,
        items: Vec<CheckoutItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Self, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        if let Some(index) = items.iter().position(|item| item.quantity == 0) {
            return Err(ValidationError::InvalidQuantity {
                index,
                value: "0".into(),
            });
        }
        if let Some((field, _)) = shipping_address
            .fields()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
        {
            return Err(ValidationError::MissingAddressField(field));
        }

        Ok(Self {
            user_id,
            items,
            shipping_address,
        })
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawCheckoutItem {
    fn validate(self, index: usize) -> Result<CheckoutItem, ValidationError> {
        let raw_id = blank_to_none(self.product_id).ok_or(ValidationError::MissingProduct { index })?;
        let product_id = Uuid::parse_str(&raw_id)
            .map_err(|_| ValidationError::InvalidProductId { index, value: raw_id.clone() })?;

        let quantity_input = self.quantity.ok_or(ValidationError::MissingQuantity { index })?;
        let quantity = quantity_input.parse().ok_or_else(|| ValidationError::InvalidQuantity {
            index,
            value: quantity_input.raw(),
        })?;

        Ok(CheckoutItem {
            product_id,
            size: blank_to_none(self.size).map(SizeLabel::new),
            quantity,
        })
    }
}

impl RawShippingAddress {
    fn validate(self) -> Result<ShippingAddress, ValidationError> {
        let field = |value: Option<String>, name: &'static str| {
            blank_to_none(value).ok_or(ValidationError::MissingAddressField(name))
        };

        Ok(ShippingAddress {
            name: field(self.name, "name")?,
            address: field(self.address, "address")?,
            city: field(self.city, "city")?,
            postal_code: field(self.postal_code, "postalCode")?,
            country: field(self.country, "country")?,
            phone: field(self.phone, "phone")?,
        })
    }
}

impl CheckoutRequest {
    pub fn validate(self, user_id: Uuid) -> Result<ValidatedCheckout, ValidationError> {
        let raw_items = self.items.unwrap_or_default();
        if raw_items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        let items = raw_items
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let shipping_address = self
            .shipping_address
            .ok_or(ValidationError::MissingShippingAddress)?
            .validate()?;

        ValidatedCheckout::new(user_id, items, shipping_address)
    }
}
