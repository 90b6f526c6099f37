use crate::error::SampleError;
use crate::model::{whole, OrderId, ProductId, LINE_ITEM};
use resource_manager::mock::MockRecord;
use resource_manager::AttrValue;
use serde::Serialize;

/// One product line of an order, priced when the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub unit_price: f64,
}

impl LineItem {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

impl TryFrom<&MockRecord> for LineItem {
    type Error = SampleError;

    fn try_from(record: &MockRecord) -> Result<Self, Self::Error> {
        let missing = |field| SampleError::MissingField {
            entity: LINE_ITEM,
            field,
        };
        Ok(Self {
            order_id: OrderId(whole(record, "order_id").ok_or_else(|| missing("order_id"))?),
            product_id: ProductId(
                whole(record, "product_id").ok_or_else(|| missing("product_id"))?,
            ),
            quantity: whole(record, "quantity").ok_or_else(|| missing("quantity"))?,
            unit_price: record
                .get("unit_price")
                .and_then(AttrValue::as_f64)
                .ok_or_else(|| missing("unit_price"))?,
        })
    }
}
