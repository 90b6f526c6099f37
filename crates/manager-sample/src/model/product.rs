/// A catalog product, read back from a [`MockRecord`].
///
/// Products are managed by the
/// [`ProductManager`](crate::managers::ProductManager) type. New products
/// start active with no stock unless the caller says otherwise.
use crate::error::SampleError;
use crate::model::{whole, PRODUCT};
use resource_manager::mock::MockRecord;
use resource_manager::{AttrValue, AttributeTree};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u64);

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "product_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    pub quantity: u64,
    pub active: bool,
}

impl TryFrom<&MockRecord> for Product {
    type Error = SampleError;

    fn try_from(record: &MockRecord) -> Result<Self, Self::Error> {
        let missing = |field| SampleError::MissingField {
            entity: PRODUCT,
            field,
        };
        Ok(Self {
            id: record.id.map(ProductId).ok_or_else(|| missing("id"))?,
            name: record
                .get("name")
                .and_then(AttrValue::as_text)
                .ok_or_else(|| missing("name"))?
                .to_string(),
            price: record
                .get("price")
                .and_then(AttrValue::as_f64)
                .ok_or_else(|| missing("price"))?,
            quantity: whole(record, "quantity").unwrap_or(0),
            active: !matches!(record.get("active"), Some(AttrValue::Bool(false))),
        })
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    /// Decimal text in the configured locale, e.g. `"12.50"`.
    pub price: String,
    pub quantity: u64,
}

impl From<ProductCreate> for AttributeTree {
    fn from(params: ProductCreate) -> Self {
        AttributeTree::new()
            .with("name", params.name)
            .with("price", params.price)
            .with("quantity", params.quantity)
    }
}

/// Payload for updating a product. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub price: Option<String>,
    pub quantity: Option<u64>,
    pub active: Option<bool>,
}

impl From<ProductUpdate> for AttributeTree {
    fn from(params: ProductUpdate) -> Self {
        let mut tree = AttributeTree::new();
        if let Some(price) = params.price {
            tree.insert("price", price);
        }
        if let Some(quantity) = params.quantity {
            tree.insert("quantity", quantity);
        }
        if let Some(active) = params.active {
            tree.insert("active", active);
        }
        tree
    }
}
