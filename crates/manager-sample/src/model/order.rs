/// A customer order, read back from a [`MockRecord`].
///
/// Orders are created through
/// [`CatalogSystem::place_order`](crate::lifecycle::CatalogSystem::place_order),
/// which reserves stock and writes the line items in the same transaction.
use crate::error::SampleError;
use crate::model::{whole, ProductId, ORDER};
use resource_manager::mock::MockRecord;
use resource_manager::AttrValue;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: u64,
    pub status: String,
    pub total: f64,
    /// Associations loaded with the record.
    pub loaded: Vec<String>,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == "open"
    }
}

impl TryFrom<&MockRecord> for Order {
    type Error = SampleError;

    fn try_from(record: &MockRecord) -> Result<Self, Self::Error> {
        let missing = |field| SampleError::MissingField {
            entity: ORDER,
            field,
        };
        Ok(Self {
            id: record.id.map(OrderId).ok_or_else(|| missing("id"))?,
            customer_id: whole(record, "customer_id").ok_or_else(|| missing("customer_id"))?,
            status: record
                .get("status")
                .and_then(AttrValue::as_text)
                .ok_or_else(|| missing("status"))?
                .to_string(),
            total: record
                .get("total")
                .and_then(AttrValue::as_f64)
                .unwrap_or(0.0),
            loaded: record.loaded.clone(),
        })
    }
}

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u64,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: u64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}
