//! Tests touching the process-wide configuration registry run serially.

use resource_manager::backend::SemanticType;
use resource_manager::config::{self, DecimalSeparator, EagerLoading, ManagerConfig};
use resource_manager::mock::{MockBackend, MockSchema};
use resource_manager::{AttrValue, AttributeTree, ConfigError, ManagerType, Options};
use serial_test::serial;
use std::sync::Arc;

fn backend() -> Arc<MockBackend> {
    let schema = MockSchema::new().entity("Invoice", |e| {
        e.attribute("total", SemanticType::Decimal)
            .attribute("due_on", SemanticType::Date)
    });
    Arc::new(MockBackend::new(schema))
}

struct InvoiceManager;
struct InvoiceService;

#[test]
#[serial]
fn test_types_snapshot_the_registry_when_built() {
    config::reset();
    config::set_decimal_separator("comma").unwrap();
    config::set_eager_loading("preload").unwrap();

    let ty = ManagerType::builder(backend())
        .for_type::<InvoiceManager>()
        .build()
        .unwrap();
    config::reset();

    assert_eq!(ty.decimal_separator(), DecimalSeparator::Comma);
    assert_eq!(ty.eager_loading(), EagerLoading::Preload);

    let mut m = ty.instance();
    m.new_template(AttributeTree::new().with("total", "12,50"))
        .unwrap();
    assert_eq!(m.attributes().get("total"), Some(&AttrValue::from("12.50")));
}

#[test]
#[serial]
fn test_registry_selection_requires_matching_adapters() {
    config::reset();
    config::set_authorization_adapter("policy").unwrap();
    let err = ManagerType::builder(backend())
        .entity("Invoice")
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingAdapter {
            category: "authorization"
        }
    );

    config::reset();
    config::set_search_adapter("predicate").unwrap();
    config::set_pagination_adapter("offset").unwrap();
    let ty = ManagerType::builder(backend())
        .entity("Invoice")
        .build()
        .unwrap();
    config::reset();

    let scope = ty
        .instance()
        .list(Options::new().search(serde_json::json!({"total_gt": "10"})).per_page(5))
        .unwrap();
    assert_eq!(scope.conditions.len(), 1);
    assert_eq!((scope.limit, scope.offset), (Some(5), 0));
}

#[test]
#[serial]
fn test_suffix_changes_apply_to_later_types_only() {
    config::reset();
    let before = ManagerType::builder(backend())
        .for_type::<InvoiceService>()
        .build()
        .unwrap();
    assert!(before.entity().is_none());

    config::set_type_suffix("Service").unwrap();
    let after = ManagerType::builder(backend())
        .for_type::<InvoiceService>()
        .build()
        .unwrap();
    config::reset();

    assert_eq!(after.entity().map(|e| e.name()), Some("Invoice"));
    assert!(before.entity().is_none());
}

#[test]
#[serial]
fn test_invalid_values_leave_the_registry_untouched() {
    config::reset();
    assert!(matches!(
        config::set_pagination_adapter("will_paginate"),
        Err(ConfigError::UnknownChoice { .. })
    ));
    assert!(matches!(
        config::set_eager_loading(" "),
        Err(ConfigError::Blank { .. })
    ));
    assert_eq!(config::current(), ManagerConfig::default());

    let loaded =
        ManagerConfig::from_json_str(r#"{"pagination": "offset", "type_suffix": "Service"}"#)
            .unwrap();
    config::install(loaded.clone());
    assert_eq!(config::current(), loaded);
    config::reset();
}
