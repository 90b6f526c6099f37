//! # Manager Sample
//!
//! Walks a small storefront through every action:
//!
//! 1. Staff stock the catalog (`new`, `create`, `edit`, `update`).
//! 2. A guest browses it (`list` with search, order and pagination).
//! 3. A customer places orders (`create` with an extension, in a transaction).
//! 4. Staff ship one order; an admin cancels another (`update`, `delete`).
//!
//! Run with `RUST_LOG=info` for one line per action, `RUST_LOG=debug` for
//! every stage.

use manager_sample::lifecycle::CatalogSystem;
use manager_sample::model::{OrderLine, ProductCreate, ProductUpdate};
use manager_sample::SampleError;
use resource_manager::mock::MockUser;
use resource_manager::tracing::setup_tracing;
use resource_manager::Options;
use serde_json::json;
use tracing::{error, info, info_span};

fn main() -> Result<(), SampleError> {
    // Setup tracing once for the entire application
    setup_tracing();

    info!("Starting catalog demo");
    let system = CatalogSystem::new()?;

    let admin = MockUser::new(1, "admin");
    let staff = MockUser::new(2, "staff");
    let alice = MockUser::new(7, "customer");

    let span = info_span!("stocking");
    let (widget, bolt) = span.in_scope(|| -> Result<_, SampleError> {
        let form = system.product_form(&staff, None)?;
        info!(defaults = %json!(form.attributes), "Blank product form");

        let widget = system.add_product(
            &staff,
            ProductCreate {
                name: "Widget".to_string(),
                price: "12.50".to_string(),
                quantity: 10,
            },
        )?;
        let bolt = system.add_product(
            &staff,
            ProductCreate {
                name: "Bolt".to_string(),
                price: "0.40".to_string(),
                quantity: 500,
            },
        )?;
        system.add_product(
            &staff,
            ProductCreate {
                name: "Anvil".to_string(),
                price: "99".to_string(),
                quantity: 0,
            },
        )?;

        let restocked = system.update_product(
            &staff,
            widget,
            ProductUpdate {
                quantity: Some(20),
                ..ProductUpdate::default()
            },
        )?;
        info!(product_id = %restocked.id, quantity = restocked.quantity, "Restocked");
        Ok((widget, bolt))
    })?;

    let span = info_span!("browsing");
    span.in_scope(|| -> Result<(), SampleError> {
        let cheap = system.catalog(
            None,
            Options::new()
                .search(json!({"price_lt": "20"}))
                .page(1, 5),
        )?;
        let names: Vec<_> = cheap.iter().map(|p| p.name.as_str()).collect();
        info!(?names, "Products under 20");

        let prices = system.price_list(None)?;
        info!(?prices, "Price list");

        if let Err(e) = system.add_product(
            &alice,
            ProductCreate {
                name: "Counterfeit".to_string(),
                price: "1".to_string(),
                quantity: 1,
            },
        ) {
            info!(error = %e, "Customer kept out of stocking");
        }
        Ok(())
    })?;

    let span = info_span!("ordering");
    let (first, second) = span.in_scope(|| -> Result<_, SampleError> {
        let first = system.place_order(
            &alice,
            &[OrderLine::new(widget, 2), OrderLine::new(bolt, 10)],
        )?;
        let order = system.order(&alice, first)?;
        info!(
            order_id = %order.id,
            total = order.total,
            loaded = ?order.loaded,
            "Order read back"
        );

        match system.place_order(&alice, &[OrderLine::new(widget, 1_000)]) {
            Ok(id) => error!(order_id = %id, "Oversized order went through"),
            Err(e) => info!(error = %e, "Oversized order refused"),
        }

        let second = system.place_order(&alice, &[OrderLine::new(bolt, 5)])?;
        Ok((first, second))
    })?;

    let span = info_span!("fulfilment");
    span.in_scope(|| -> Result<(), SampleError> {
        let shipped = system.ship_order(&staff, first)?;
        info!(order_id = %shipped.id, status = %shipped.status, "Shipped");

        for item in system.line_items(&staff, first)? {
            info!(
                product_id = %item.product_id,
                quantity = item.quantity,
                subtotal = item.subtotal(),
                "Line item"
            );
        }

        let cancelled = system.cancel_order(&admin, first)?;
        info!(order_id = %first, cancelled, "Cancelling a shipped order");

        let cancelled = system.cancel_order(&admin, second)?;
        info!(order_id = %second, cancelled, "Cancelling an open order");

        let orders = system.orders(&alice, Options::new())?;
        info!(
            open = orders.iter().filter(|o| o.is_open()).count(),
            total = orders.len(),
            "Alice's orders"
        );
        Ok(())
    })?;

    info!("Catalog demo completed");
    Ok(())
}
