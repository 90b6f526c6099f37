//! # Manager Types
//!
//! One manager type per entity. The marker structs only carry a name: the
//! entity each binds to is inferred from it (`ProductManager` manages
//! `Product`).
//!
//! All types share [`catalog_config`], which selects predicate search and
//! offset pagination. Each type supplies only its own policy.

use crate::model::{LINE_ITEM, ORDER, PRODUCT};
use crate::policy::{LineItemPolicy, OrderPolicy, ProductPolicy};
use resource_manager::config::{
    AuthorizationChoice, EagerLoading, ManagerConfig, PaginationChoice, SearchChoice,
};
use resource_manager::mock::MockBackend;
use resource_manager::{Action, ActionScope, ConfigError, ManagerType, OptionKey};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub struct ProductManager;
pub struct OrderManager;
pub struct LineItemManager;

pub type CatalogType = ManagerType<MockBackend>;

/// Products listed per page unless the caller asks otherwise.
pub const PRODUCTS_PER_PAGE: u64 = 10;

pub fn catalog_config() -> ManagerConfig {
    ManagerConfig {
        authorization: AuthorizationChoice::Policy,
        search: SearchChoice::Predicate,
        pagination: PaginationChoice::Offset,
        eager_loading: EagerLoading::Preload,
        ..ManagerConfig::default()
    }
}

/// Products sort by name, page by [`PRODUCTS_PER_PAGE`] and start out active
/// and out of stock.
pub fn product_manager(backend: &Arc<MockBackend>) -> Result<CatalogType, ConfigError> {
    let ty = ManagerType::builder(Arc::clone(backend))
        .for_type::<ProductManager>()
        .with_config(catalog_config())
        .policy(ProductPolicy)
        .default(OptionKey::Order, ActionScope::All, "name")
        .default(OptionKey::PerPage, Action::List, PRODUCTS_PER_PAGE)
        .default(
            OptionKey::Attributes,
            ActionScope::All,
            json!({"active": true, "quantity": 0}),
        )
        .build()?;
    debug!(manager = ty.name(), entity = PRODUCT, "Defined");
    Ok(ty)
}

/// A read-only view of products selecting only what a price list shows.
pub fn price_list_manager(products: &CatalogType) -> Result<CatalogType, ConfigError> {
    products
        .extend("PriceListManager")
        .only([Action::List, Action::Read])
        .default(OptionKey::Select, ActionScope::All, json!(["name", "price"]))
        .default(OptionKey::Scopes, Action::List, json!(["in_stock"]))
        .build()
}

/// New orders belong to the acting customer and start open. Reads load the
/// line items along with the order.
pub fn order_manager(backend: &Arc<MockBackend>) -> Result<CatalogType, ConfigError> {
    let ty = ManagerType::builder(Arc::clone(backend))
        .for_type::<OrderManager>()
        .with_config(catalog_config())
        .policy(OrderPolicy)
        .default(OptionKey::Order, Action::List, "id desc")
        .default(OptionKey::Includes, ActionScope::All, json!(["line_items"]))
        .deferred_default(OptionKey::Attributes, ActionScope::All, |ctx| match ctx.user {
            Some(user) => json!({"customer_id": user.id, "status": "open", "total": 0}),
            None => json!({"status": "open", "total": 0}),
        })
        .build()?;
    debug!(manager = ty.name(), entity = ORDER, "Defined");
    Ok(ty)
}

/// Line items are immutable once written.
pub fn line_item_manager(backend: &Arc<MockBackend>) -> Result<CatalogType, ConfigError> {
    let ty = ManagerType::builder(Arc::clone(backend))
        .for_type::<LineItemManager>()
        .with_config(catalog_config())
        .except([Action::Edit, Action::Update])
        .policy(LineItemPolicy)
        .default(OptionKey::Order, Action::List, "id")
        .build()?;
    debug!(manager = ty.name(), entity = LINE_ITEM, "Defined");
    Ok(ty)
}
