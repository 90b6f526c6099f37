//! # Catalog Model
//!
//! Three entities share one in-memory backend:
//!
//! | Entity | Attributes | Associations |
//! |--------|------------|--------------|
//! | `Product` | name, price, quantity, active | has many line items |
//! | `Order` | customer_id, status, total | has many line items |
//! | `LineItem` | order_id, product_id, quantity, unit_price | belongs to order and product |
//!
//! [`catalog_backend`] declares the schema together with the validators,
//! destroy guards and named scopes the backend enforces. The typed views in
//! the submodules are read back from [`MockRecord`]s after an action ran.

mod line_item;
mod order;
mod product;

pub use line_item::*;
pub use order::*;
pub use product::*;

use resource_manager::backend::{Condition, Predicate, SemanticType};
use resource_manager::mock::{MockBackend, MockRecord, MockSchema};
use resource_manager::AttrValue;

pub const PRODUCT: &str = "Product";
pub const ORDER: &str = "Order";
pub const LINE_ITEM: &str = "LineItem";

/// Order statuses accepted by the validator.
pub const ORDER_STATUSES: [&str; 4] = ["open", "paid", "shipped", "cancelled"];

pub fn catalog_schema() -> MockSchema {
    MockSchema::new()
        .entity(PRODUCT, |e| {
            e.attribute("name", SemanticType::String)
                .attribute("price", SemanticType::Decimal)
                .attribute("quantity", SemanticType::Integer)
                .attribute("active", SemanticType::Boolean)
                .has_many("line_items", LINE_ITEM)
        })
        .entity(ORDER, |e| {
            e.attribute("customer_id", SemanticType::Integer)
                .attribute("status", SemanticType::String)
                .attribute("total", SemanticType::Decimal)
                .has_many("line_items", LINE_ITEM)
        })
        .entity(LINE_ITEM, |e| {
            e.attribute("order_id", SemanticType::Integer)
                .attribute("product_id", SemanticType::Integer)
                .attribute("quantity", SemanticType::Integer)
                .attribute("unit_price", SemanticType::Decimal)
                .belongs_to("order", ORDER)
                .belongs_to("product", PRODUCT)
        })
}

/// The schema plus its validation rules, destroy guards and named scopes.
pub fn catalog_backend() -> MockBackend {
    MockBackend::new(catalog_schema())
        .with_validator(PRODUCT, validate_product)
        .with_validator(ORDER, validate_order)
        .with_validator(LINE_ITEM, validate_line_item)
        .with_destroy_guard(ORDER, |order| {
            let shipped = order
                .get("status")
                .and_then(AttrValue::as_text)
                .is_some_and(|s| s == "shipped");
            shipped.then(|| "shipped orders cannot be deleted".to_string())
        })
        .with_named_scope(
            PRODUCT,
            "in_stock",
            [Condition::new("quantity", Predicate::Gt, 0)],
        )
        .with_named_scope(ORDER, "open", [Condition::new("status", Predicate::Eq, "open")])
}

fn validate_product(record: &MockRecord) -> Vec<String> {
    let mut errors = Vec::new();
    if record.get("name").map_or(true, AttrValue::is_blank) {
        errors.push("name can't be blank".to_string());
    }
    match record.get("price").map(AttrValue::as_f64) {
        None => errors.push("price can't be blank".to_string()),
        Some(None) => errors.push("price is not a number".to_string()),
        Some(Some(price)) if price < 0.0 => errors.push("price must not be negative".to_string()),
        Some(Some(_)) => {}
    }
    if record
        .get("quantity")
        .and_then(AttrValue::as_f64)
        .is_some_and(|q| q < 0.0)
    {
        errors.push("quantity must not be negative".to_string());
    }
    errors
}

fn validate_order(record: &MockRecord) -> Vec<String> {
    let mut errors = Vec::new();
    if record.get("customer_id").map_or(true, AttrValue::is_blank) {
        errors.push("customer_id can't be blank".to_string());
    }
    let status = record.get("status").and_then(AttrValue::as_text);
    if !status.is_some_and(|s| ORDER_STATUSES.contains(&s)) {
        errors.push(format!("status {status:?} is not one of {ORDER_STATUSES:?}"));
    }
    errors
}

fn validate_line_item(record: &MockRecord) -> Vec<String> {
    let quantity = record.get("quantity").and_then(AttrValue::as_f64);
    if quantity.is_some_and(|q| q >= 1.0) {
        Vec::new()
    } else {
        vec!["quantity must be at least 1".to_string()]
    }
}

/// Numeric attribute as `u64`; negatives and fractions are rejected.
pub(crate) fn whole(record: &MockRecord, field: &str) -> Option<u64> {
    let value = record.get(field)?.as_f64()?;
    (value >= 0.0 && value.fract() == 0.0).then_some(value as u64)
}
