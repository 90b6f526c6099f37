use manager_sample::lifecycle::CatalogSystem;
use manager_sample::model::{
    OrderLine, ProductCreate, ProductId, ProductUpdate, LINE_ITEM, ORDER, PRODUCT,
};
use manager_sample::SampleError;
use pretty_assertions::assert_eq;
use resource_manager::backend::EntityType;
use resource_manager::mock::MockUser;
use resource_manager::{AttrValue, ManagerError, Options};
use serde_json::json;

fn staff() -> MockUser {
    MockUser::new(2, "staff")
}

fn alice() -> MockUser {
    MockUser::new(7, "customer")
}

fn bob() -> MockUser {
    MockUser::new(8, "customer")
}

fn product(name: &str, price: &str, quantity: u64) -> ProductCreate {
    ProductCreate {
        name: name.to_string(),
        price: price.to_string(),
        quantity,
    }
}

/// Widget 12.50 x10, Bolt 0.40 x500, Anvil 99 x0.
fn stocked() -> (CatalogSystem, ProductId, ProductId, ProductId) {
    let system = CatalogSystem::new().expect("Failed to build catalog");
    let widget = system
        .add_product(&staff(), product("Widget", "12.50", 10))
        .expect("Failed to add widget");
    let bolt = system
        .add_product(&staff(), product("Bolt", "0.40", 500))
        .expect("Failed to add bolt");
    let anvil = system
        .add_product(&staff(), product("Anvil", "99", 0))
        .expect("Failed to add anvil");
    (system, widget, bolt, anvil)
}

fn stock(system: &CatalogSystem, id: ProductId) -> u64 {
    system
        .product(None, id)
        .expect("Failed to read product")
        .quantity
}

fn count(system: &CatalogSystem, entity: &str) -> usize {
    system.backend.count(&EntityType::new(entity))
}

#[test]
fn test_full_order_flow() {
    let (system, widget, bolt, _) = stocked();

    let order_id = system
        .place_order(&alice(), &[OrderLine::new(widget, 2), OrderLine::new(bolt, 10)])
        .expect("Failed to place order");

    let order = system.order(&alice(), order_id).expect("Failed to read order");
    assert_eq!(order.customer_id, 7);
    assert_eq!(order.status, "open");
    assert_eq!(order.total, 29.0);
    assert_eq!(order.loaded, vec!["line_items"]);

    assert_eq!(stock(&system, widget), 8);
    assert_eq!(stock(&system, bolt), 490);

    let items = system
        .line_items(&staff(), order_id)
        .expect("Failed to list line items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_id, widget);
    assert_eq!(items[0].unit_price, 12.5);
    assert_eq!(items.iter().map(|i| i.subtotal()).sum::<f64>(), order.total);
}

#[test]
fn test_shortage_rolls_back_every_write() {
    let (system, widget, _, anvil) = stocked();

    let err = system
        .place_order(&alice(), &[OrderLine::new(widget, 3), OrderLine::new(anvil, 1)])
        .unwrap_err();

    match err {
        SampleError::Rejected { entity, errors } => {
            assert_eq!(entity, ORDER);
            assert_eq!(errors, vec![format!("{anvil} has 0 left, 1 requested")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stock(&system, widget), 10);
    assert_eq!(count(&system, ORDER), 0);
    assert_eq!(count(&system, LINE_ITEM), 0);
}

#[test]
fn test_invalid_line_rolls_back_the_order() {
    let (system, widget, _, _) = stocked();

    let err = system
        .place_order(&alice(), &[OrderLine::new(widget, 0)])
        .unwrap_err();

    assert!(matches!(err, SampleError::Rejected { .. }));
    assert_eq!(count(&system, ORDER), 0);
    assert_eq!(count(&system, LINE_ITEM), 0);
}

#[test]
fn test_unknown_product_aborts_the_order() {
    let (system, widget, _, _) = stocked();

    let err = system
        .place_order(&alice(), &[OrderLine::new(widget, 1), OrderLine::new(ProductId(999), 1)])
        .unwrap_err();

    assert!(matches!(
        err,
        SampleError::Manager(ManagerError::RecordNotFound { .. })
    ));
    assert_eq!(stock(&system, widget), 10);
    assert_eq!(count(&system, ORDER), 0);
}

#[test]
fn test_empty_orders_are_refused_up_front() {
    let (system, _, _, _) = stocked();
    system.backend.clear_journal();

    let err = system.place_order(&alice(), &[]).unwrap_err();

    assert!(matches!(err, SampleError::Rejected { .. }));
    assert!(system.backend.journal().is_empty());
}

#[test]
fn test_customers_only_see_their_own_orders() {
    let (system, widget, bolt, _) = stocked();
    let alices = system
        .place_order(&alice(), &[OrderLine::new(widget, 1)])
        .unwrap();
    let bobs = system.place_order(&bob(), &[OrderLine::new(bolt, 1)]).unwrap();

    let listed: Vec<_> = system
        .orders(&alice(), Options::new())
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(listed, vec![alices]);

    let err = system.order(&alice(), bobs).unwrap_err();
    assert!(err.is_authorization_denied());
    assert_eq!(
        err.to_string(),
        "Not authorized to read Order: customers may not read here"
    );

    let everything = system.orders(&staff(), Options::new()).unwrap();
    let ids: Vec<_> = everything.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![bobs, alices]);
}

#[test]
fn test_staff_can_act_on_behalf_of_a_customer() {
    let (system, widget, bolt, _) = stocked();
    let alices = system
        .place_order(&alice(), &[OrderLine::new(widget, 1)])
        .unwrap();
    system.place_order(&bob(), &[OrderLine::new(bolt, 1)]).unwrap();

    let mut manager = system.orders.instance_for(staff());
    let scope = manager
        .with_user(alice(), |m| m.list(Options::new()))
        .unwrap();
    let seen: Vec<_> = system.backend.load(&scope).iter().map(|r| r.id).collect();

    assert_eq!(seen, vec![Some(alices.0)]);
    assert_eq!(manager.user(), Some(&staff()));
}

#[test]
fn test_guests_browse_active_products_only() {
    let (system, widget, bolt, _) = stocked();
    system
        .update_product(
            &staff(),
            bolt,
            ProductUpdate {
                active: Some(false),
                ..ProductUpdate::default()
            },
        )
        .unwrap();

    let names = |user: Option<&MockUser>| -> Vec<String> {
        system
            .catalog(user, Options::new())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect()
    };
    assert_eq!(names(None), vec!["Anvil", "Widget"]);
    assert_eq!(names(Some(&staff())), vec!["Anvil", "Bolt", "Widget"]);

    let cheap = system
        .catalog(None, Options::new().search(json!({"price_lt": "20"})))
        .unwrap();
    assert_eq!(cheap.len(), 1);
    assert_eq!(cheap[0].id, widget);
}

#[test]
fn test_catalog_pages_by_ten() {
    let system = CatalogSystem::new().unwrap();
    for n in 0..12 {
        system
            .add_product(&staff(), product(&format!("Item {n:02}"), "1", 1))
            .unwrap();
    }

    let first = system.catalog(None, Options::new()).unwrap();
    let last = system
        .catalog(None, Options::new().page(2, 10))
        .unwrap();

    assert_eq!(first.len(), 10);
    assert_eq!(first[0].name, "Item 00");
    assert_eq!(last.len(), 2);
    assert_eq!(last[1].name, "Item 11");
}

#[test]
fn test_price_list_shows_stocked_names_and_prices() {
    let (system, _, _, _) = stocked();

    let prices = system.price_list(None).unwrap();

    assert_eq!(
        prices,
        vec![("Bolt".to_string(), 0.4), ("Widget".to_string(), 12.5)]
    );
    let err = system
        .price_list
        .instance_for(staff())
        .create(Default::default())
        .unwrap_err();
    assert!(matches!(err, ManagerError::ActionNotEnabled { .. }));
}

#[test]
fn test_cancel_returns_stock() {
    let (system, widget, bolt, _) = stocked();
    let order = system
        .place_order(&alice(), &[OrderLine::new(widget, 3), OrderLine::new(bolt, 20)])
        .unwrap();

    assert!(system.cancel_order(&MockUser::new(1, "admin"), order).unwrap());

    assert_eq!(stock(&system, widget), 10);
    assert_eq!(stock(&system, bolt), 500);
    assert_eq!(count(&system, ORDER), 0);
    assert_eq!(count(&system, LINE_ITEM), 0);
}

#[test]
fn test_shipped_orders_cannot_be_cancelled() {
    let (system, widget, _, _) = stocked();
    let order = system
        .place_order(&alice(), &[OrderLine::new(widget, 3)])
        .unwrap();
    let shipped = system.ship_order(&staff(), order).unwrap();
    assert_eq!(shipped.status, "shipped");

    let cancelled = system
        .cancel_order(&MockUser::new(1, "admin"), order)
        .unwrap();

    assert!(!cancelled);
    assert_eq!(stock(&system, widget), 7);
    assert_eq!(count(&system, ORDER), 1);
    assert_eq!(count(&system, LINE_ITEM), 1);
}

#[test]
fn test_only_admins_cancel() {
    let (system, widget, _, _) = stocked();
    let order = system
        .place_order(&alice(), &[OrderLine::new(widget, 1)])
        .unwrap();

    for user in [alice(), staff()] {
        let err = system.cancel_order(&user, order).unwrap_err();
        assert!(err.is_authorization_denied());
    }
    assert_eq!(count(&system, ORDER), 1);
}

#[test]
fn test_customers_cannot_stock_the_catalog() {
    let system = CatalogSystem::new().unwrap();

    let err = system
        .add_product(&alice(), product("Counterfeit", "1", 1))
        .unwrap_err();

    assert!(err.is_authorization_denied());
    assert_eq!(count(&system, PRODUCT), 0);
}

#[test]
fn test_invalid_products_are_rejected() {
    let system = CatalogSystem::new().unwrap();

    let err = system
        .add_product(&staff(), product(" ", "abc", 1))
        .unwrap_err();

    match err {
        SampleError::Rejected { entity, errors } => {
            assert_eq!(entity, PRODUCT);
            assert_eq!(errors, vec!["name can't be blank", "price is not a number"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_product_forms() {
    let (system, widget, _, _) = stocked();

    let blank = system.product_form(&staff(), None).unwrap();
    assert_eq!(blank.id, None);
    assert_eq!(blank.get("active"), Some(&AttrValue::Bool(true)));
    assert_eq!(blank.get("quantity"), Some(&AttrValue::Integer(0)));

    let existing = system.product_form(&staff(), Some(widget)).unwrap();
    assert_eq!(existing.id, Some(widget.0));
    assert_eq!(existing.get("name"), Some(&AttrValue::from("Widget")));

    let err = system.product_form(&alice(), Some(widget)).unwrap_err();
    assert!(err.is_authorization_denied());
}
