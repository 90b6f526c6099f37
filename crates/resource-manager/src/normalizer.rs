//! # Attribute Normalizer
//!
//! Prepares user input before it reaches the backend. The normalizer walks an
//! [`AttributeTree`] against the live [`Schema`]:
//!
//! - `<association>_attributes` keys recurse into the association's target
//!   entity type (lists element-wise; index-keyed objects value-wise). Unknown
//!   associations are passed through untouched.
//! - `date` and `date_time` attributes parse flexible text into typed values.
//! - `decimal` and `float` attributes swap a lone comma for a point when the
//!   locale uses a comma separator.
//!
//! Nothing here fails. Input that cannot be coerced is kept as given, and the
//! caller's tree is never modified; the result is always a fresh copy.

use crate::attributes::{AttrValue, AttributeTree};
use crate::backend::{EntityType, Schema, SemanticType};
use crate::config::DecimalSeparator;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::trace;

/// Key suffix marking a nested attribute set for an association.
pub const NESTED_ATTRIBUTES_SUFFIX: &str = "_attributes";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Normalizes `tree` for `entity` and returns the normalized copy.
pub fn normalize(
    schema: &dyn Schema,
    entity: &EntityType,
    tree: &AttributeTree,
    separator: DecimalSeparator,
) -> AttributeTree {
    tree.iter()
        .map(|(key, value)| {
            let normalized = match nested_association(key) {
                Some(association) => match schema.association_target_type(entity, association) {
                    Some(target) => normalize_nested(schema, &target, value, separator),
                    None => {
                        trace!(%entity, association, "Unknown association, passing through");
                        value.clone()
                    }
                },
                None => match schema.attribute_semantic_type(entity, key) {
                    Some(kind) => coerce(kind, value, separator),
                    None => value.clone(),
                },
            };
            (key.to_string(), normalized)
        })
        .collect()
}

fn nested_association(key: &str) -> Option<&str> {
    key.strip_suffix(NESTED_ATTRIBUTES_SUFFIX)
        .filter(|name| !name.is_empty())
}

fn normalize_nested(
    schema: &dyn Schema,
    target: &EntityType,
    value: &AttrValue,
    separator: DecimalSeparator,
) -> AttrValue {
    match value {
        AttrValue::Tree(tree) if is_index_keyed(tree) => AttrValue::Tree(
            tree.iter()
                .map(|(index, child)| {
                    (index.to_string(), normalize_nested(schema, target, child, separator))
                })
                .collect(),
        ),
        AttrValue::Tree(tree) => AttrValue::Tree(normalize(schema, target, tree, separator)),
        AttrValue::List(items) => AttrValue::List(
            items
                .iter()
                .map(|item| normalize_nested(schema, target, item, separator))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `{"0": {...}, "1": {...}}`, the form HTML forms submit for child collections.
fn is_index_keyed(tree: &AttributeTree) -> bool {
    !tree.is_empty()
        && tree
            .iter()
            .all(|(k, v)| k.bytes().all(|b| b.is_ascii_digit()) && v.as_tree().is_some())
}

fn coerce(kind: SemanticType, value: &AttrValue, separator: DecimalSeparator) -> AttrValue {
    if let AttrValue::List(items) = value {
        return AttrValue::List(items.iter().map(|v| coerce(kind, v, separator)).collect());
    }
    let Some(text) = value.as_text() else {
        return value.clone();
    };
    let coerced = match kind {
        SemanticType::Date => parse_date(text).map(AttrValue::Date),
        SemanticType::DateTime => parse_date_time(text).map(AttrValue::DateTime),
        SemanticType::Decimal | SemanticType::Float => {
            localize_decimal(text, separator).map(AttrValue::Text)
        }
        _ => None,
    };
    coerced.unwrap_or_else(|| value.clone())
}

/// Parses a date from common textual forms, falling back to the date part of a
/// date-time.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date_time(text).map(|dt| dt.date()))
}

/// Parses a date-time; RFC 3339 input is converted to UTC, a bare date means
/// midnight.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `"12,50"` becomes `"12.50"` under a comma locale. Any text with a point, or
/// with more or fewer than one comma, is left alone.
pub fn localize_decimal(text: &str, separator: DecimalSeparator) -> Option<String> {
    let rewrite = separator == DecimalSeparator::Comma
        && !text.contains('.')
        && text.matches(',').count() == 1;
    rewrite.then(|| text.replacen(',', ".", 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSchema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> MockSchema {
        MockSchema::new()
            .entity("Order", |e| {
                e.attribute("placed_on", SemanticType::Date)
                    .attribute("shipped_at", SemanticType::DateTime)
                    .attribute("discount", SemanticType::Decimal)
                    .has_many("line_items", "LineItem")
            })
            .entity("LineItem", |e| {
                e.attribute("unit_price", SemanticType::Decimal)
                    .attribute("weight", SemanticType::Float)
                    .attribute("quantity", SemanticType::Integer)
            })
    }

    fn order() -> EntityType {
        EntityType::new("Order")
    }

    #[test]
    fn test_decimal_comma_rules() {
        use DecimalSeparator::*;
        assert_eq!(localize_decimal("12,50", Comma).as_deref(), Some("12.50"));
        assert_eq!(localize_decimal("12,50", Point), None);
        assert_eq!(localize_decimal("12.5,0", Comma), None);
        assert_eq!(localize_decimal("1,234,5", Comma), None);
        assert_eq!(localize_decimal("1250", Comma), None);
    }

    #[test]
    fn test_decimals_follow_the_locale() {
        let input = AttributeTree::new().with("discount", "12,50");
        let comma = normalize(&schema(), &order(), &input, DecimalSeparator::Comma);
        let point = normalize(&schema(), &order(), &input, DecimalSeparator::Point);
        assert_eq!(comma.get("discount"), Some(&AttrValue::from("12.50")));
        assert_eq!(point.get("discount"), Some(&AttrValue::from("12,50")));

        let ambiguous = AttributeTree::new().with("discount", "12.5,0");
        for sep in [DecimalSeparator::Comma, DecimalSeparator::Point] {
            let out = normalize(&schema(), &order(), &ambiguous, sep);
            assert_eq!(out.get("discount"), Some(&AttrValue::from("12.5,0")));
        }
    }

    #[test]
    fn test_dates_parse_or_pass_through() {
        let input = AttributeTree::new()
            .with("placed_on", "01.03.2024")
            .with("shipped_at", "2024-03-02 14:30");
        let out = normalize(&schema(), &order(), &input, DecimalSeparator::Point);
        assert_eq!(
            out.get("placed_on"),
            Some(&AttrValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(
            out.get("shipped_at"),
            Some(&AttrValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 3, 2)
                    .unwrap()
                    .and_hms_opt(14, 30, 0)
                    .unwrap()
            ))
        );

        let garbage = AttributeTree::new().with("placed_on", "next tuesday-ish");
        let out = normalize(&schema(), &order(), &garbage, DecimalSeparator::Point);
        assert_eq!(out.get("placed_on"), Some(&AttrValue::from("next tuesday-ish")));
    }

    #[test]
    fn test_rfc3339_converts_to_utc() {
        let dt = parse_date_time("2024-03-02T14:30:00+02:00").unwrap();
        assert_eq!(dt.to_string(), "2024-03-02 12:30:00");
        assert_eq!(
            parse_date("2024-03-02T14:30:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
    }

    #[test]
    fn test_nested_lists_use_the_association_type() {
        let input = AttributeTree::from(json!({
            "discount": "1,5",
            "line_items_attributes": [
                {"unit_price": "3,20", "quantity": "2"},
                {"weight": "0,75"}
            ]
        }));
        let out = normalize(&schema(), &order(), &input, DecimalSeparator::Comma);
        let expected = AttributeTree::from(json!({
            "discount": "1.5",
            "line_items_attributes": [
                {"unit_price": "3.20", "quantity": "2"},
                {"weight": "0.75"}
            ]
        }));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_index_keyed_children_are_normalized() {
        let input = AttributeTree::from(json!({
            "line_items_attributes": {"0": {"unit_price": "9,99"}, "1": {"unit_price": "1,00"}}
        }));
        let out = normalize(&schema(), &order(), &input, DecimalSeparator::Comma);
        assert_eq!(
            out,
            AttributeTree::from(json!({
                "line_items_attributes": {"0": {"unit_price": "9.99"}, "1": {"unit_price": "1.00"}}
            }))
        );
    }

    #[test]
    fn test_unknown_associations_and_attributes_pass_through() {
        let input = AttributeTree::from(json!({
            "coupons_attributes": [{"discount": "5,0"}],
            "_attributes": "odd",
            "note": "1,5"
        }));
        let out = normalize(&schema(), &order(), &input, DecimalSeparator::Comma);
        assert_eq!(out, input);
    }

    #[test]
    fn test_input_tree_is_not_mutated() {
        let input = AttributeTree::new().with("discount", "2,5");
        let before = input.clone();
        let _ = normalize(&schema(), &order(), &input, DecimalSeparator::Comma);
        assert_eq!(input, before);
    }
}
