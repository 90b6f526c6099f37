use crate::error::SampleError;
use crate::managers::{
    line_item_manager, order_manager, price_list_manager, product_manager, CatalogType,
};
use crate::model::{
    catalog_backend, whole, LineItem, Order, OrderId, OrderLine, Product, ProductCreate, ProductId,
    ProductUpdate, LINE_ITEM, ORDER, PRODUCT,
};
use resource_manager::backend::{Backend, Condition, EntityType, Predicate};
use resource_manager::mock::{MockBackend, MockRecord, MockUser};
use resource_manager::{Action, AttrValue, AttributeTree, Manager, ManagerError, Options, Target};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// The catalog: one backend and a manager type per entity.
pub struct CatalogSystem {
    pub backend: Arc<MockBackend>,
    pub products: CatalogType,
    pub price_list: CatalogType,
    pub orders: CatalogType,
    pub line_items: CatalogType,
}

fn instance(ty: &CatalogType, user: Option<&MockUser>) -> Manager<MockBackend> {
    match user {
        Some(user) => ty.instance_for(user.clone()),
        None => ty.instance(),
    }
}

fn rejected(entity: &'static str, manager: &Manager<MockBackend>) -> SampleError {
    SampleError::Rejected {
        entity,
        errors: manager.errors(),
    }
}

fn written_record(manager: &Manager<MockBackend>) -> Result<&MockRecord, ManagerError> {
    manager.target().record().ok_or(ManagerError::MissingTarget {
        action: manager.action().unwrap_or(Action::Read),
    })
}

impl CatalogSystem {
    pub fn new() -> Result<Self, SampleError> {
        Self::with_backend(catalog_backend())
    }

    pub fn with_backend(backend: MockBackend) -> Result<Self, SampleError> {
        let backend = Arc::new(backend);
        let products = product_manager(&backend)?;
        let price_list = price_list_manager(&products)?;
        let orders = order_manager(&backend)?;
        let line_items = line_item_manager(&backend)?;
        info!("Catalog system ready");
        Ok(Self {
            backend,
            products,
            price_list,
            orders,
            line_items,
        })
    }

    // =========================================================================
    // PRODUCTS
    // =========================================================================

    pub fn add_product(
        &self,
        user: &MockUser,
        params: ProductCreate,
    ) -> Result<ProductId, SampleError> {
        let mut manager = self.products.instance_for(user.clone());
        if !manager.create(params.into())? {
            return Err(rejected(PRODUCT, &manager));
        }
        let product = Product::try_from(written_record(&manager)?)?;
        info!(product_id = %product.id, name = %product.name, "Product added");
        Ok(product.id)
    }

    pub fn update_product(
        &self,
        user: &MockUser,
        id: ProductId,
        params: ProductUpdate,
    ) -> Result<Product, SampleError> {
        let mut manager = self.products.instance_for(user.clone());
        if !manager.update(&id.0, params.into(), Options::new())? {
            return Err(rejected(PRODUCT, &manager));
        }
        Product::try_from(written_record(&manager)?)
    }

    /// A blank form for a new product, or the current one for an existing product.
    pub fn product_form(
        &self,
        user: &MockUser,
        id: Option<ProductId>,
    ) -> Result<MockRecord, SampleError> {
        let mut manager = self.products.instance_for(user.clone());
        let record = match id {
            Some(id) => manager.edit_template(&id.0, Options::new())?,
            None => manager.new_template(AttributeTree::new())?,
        };
        Ok(record)
    }

    pub fn product(&self, user: Option<&MockUser>, id: ProductId) -> Result<Product, SampleError> {
        let record = instance(&self.products, user).read_one(&id.0, Options::new())?;
        Product::try_from(&record)
    }

    /// Visible products, one page at a time.
    pub fn catalog(
        &self,
        user: Option<&MockUser>,
        options: Options,
    ) -> Result<Vec<Product>, SampleError> {
        let scope = instance(&self.products, user).list(options)?;
        self.backend.load(&scope).iter().map(Product::try_from).collect()
    }

    /// Names and prices of products in stock.
    pub fn price_list(&self, user: Option<&MockUser>) -> Result<Vec<(String, f64)>, SampleError> {
        let scope = instance(&self.price_list, user).list(Options::new())?;
        Ok(self
            .backend
            .load(&scope)
            .iter()
            .filter_map(|r| {
                let name = r.get("name")?.as_text()?.to_string();
                Some((name, r.get("price")?.as_f64()?))
            })
            .collect())
    }

    // =========================================================================
    // ORDERS
    // =========================================================================

    /// Places an order for `customer`, reserving stock for every line.
    ///
    /// Stock, the order and its line items are written in one transaction.
    /// Shortages come back as [`SampleError::Rejected`] with nothing written.
    pub fn place_order(
        &self,
        customer: &MockUser,
        lines: &[OrderLine],
    ) -> Result<OrderId, SampleError> {
        let span = info_span!("place_order", customer = customer.id, lines = lines.len());
        let _enter = span.enter();

        if lines.is_empty() {
            return Err(SampleError::Rejected {
                entity: ORDER,
                errors: vec!["an order needs at least one line".to_string()],
            });
        }

        let mut placed = None;
        let result = self.backend.run_atomically(&mut || {
            let mut orders = self.orders.instance_for(customer.clone());
            let mut priced = Vec::with_capacity(lines.len());
            let written = orders.create_with(AttributeTree::new(), |target| {
                self.reserve_stock(lines, target, &mut priced)
            })?;
            if !written {
                return Err(ManagerError::ValidationFailed {
                    entity: ORDER.to_string(),
                    errors: orders.errors(),
                });
            }
            let order_id = written_record(&orders)?
                .id
                .ok_or(ManagerError::MissingTarget {
                    action: Action::Create,
                })?;

            let mut items = self.line_items.instance_for(customer.clone());
            for (line, unit_price) in &priced {
                let attributes = AttributeTree::new()
                    .with("order_id", order_id)
                    .with("product_id", line.product_id.0)
                    .with("quantity", line.quantity)
                    .with("unit_price", *unit_price);
                if !items.create(attributes)? {
                    return Err(ManagerError::ValidationFailed {
                        entity: LINE_ITEM.to_string(),
                        errors: items.errors(),
                    });
                }
            }
            placed = Some(OrderId(order_id));
            Ok(())
        });

        match (result, placed) {
            (Ok(()), Some(id)) => {
                info!(order_id = %id, "Order placed");
                Ok(id)
            }
            (Ok(()), None) => Err(ManagerError::MissingTarget {
                action: Action::Create,
            }
            .into()),
            (Err(ManagerError::ValidationFailed { errors, .. }), _) => {
                warn!(errors = ?errors, "Order rejected");
                Err(SampleError::Rejected {
                    entity: ORDER,
                    errors,
                })
            }
            (Err(e), _) => Err(e.into()),
        }
    }

    /// Decrements stock for each line and stamps the order total. Any
    /// shortage fails the order with one message per short line.
    fn reserve_stock(
        &self,
        lines: &[OrderLine],
        target: &mut Target<MockBackend>,
        priced: &mut Vec<(OrderLine, f64)>,
    ) -> Result<(), ManagerError> {
        let scope = self.backend.scope(&EntityType::new(PRODUCT));
        let mut total = 0.0;
        let mut shortages = Vec::new();

        for line in lines {
            let mut product = self.backend.find_by_id(&scope, &line.product_id.0)?;
            let available = whole(&product, "quantity").unwrap_or(0);
            if available < line.quantity {
                shortages.push(format!(
                    "{} has {available} left, {} requested",
                    line.product_id, line.quantity
                ));
                continue;
            }
            let price = product
                .get("price")
                .and_then(AttrValue::as_f64)
                .unwrap_or(0.0);
            self.backend.assign(
                &mut product,
                &AttributeTree::new().with("quantity", available - line.quantity),
            );
            self.backend.save_or_fail(&mut product)?;
            total += price * line.quantity as f64;
            priced.push((*line, price));
        }

        let order = target.record_mut().ok_or(ManagerError::MissingTarget {
            action: Action::Create,
        })?;
        if !shortages.is_empty() {
            order.errors = shortages.clone();
            return Err(ManagerError::ValidationFailed {
                entity: ORDER.to_string(),
                errors: shortages,
            });
        }
        self.backend
            .assign(order, &AttributeTree::new().with("total", total));
        Ok(())
    }

    pub fn order(&self, user: &MockUser, id: OrderId) -> Result<Order, SampleError> {
        let record = self
            .orders
            .instance_for(user.clone())
            .read_one(&id.0, Options::new())?;
        Order::try_from(&record)
    }

    /// Orders visible to `user`, newest first.
    pub fn orders(&self, user: &MockUser, options: Options) -> Result<Vec<Order>, SampleError> {
        let scope = self.orders.instance_for(user.clone()).list(options)?;
        self.backend.load(&scope).iter().map(Order::try_from).collect()
    }

    pub fn line_items(
        &self,
        user: &MockUser,
        order: OrderId,
    ) -> Result<Vec<LineItem>, SampleError> {
        let scope = self
            .line_items
            .instance_for(user.clone())
            .list(Options::new().search(json!({ "order_id_eq": order.0 })))?;
        self.backend.load(&scope).iter().map(LineItem::try_from).collect()
    }

    pub fn ship_order(&self, user: &MockUser, id: OrderId) -> Result<Order, SampleError> {
        let mut manager = self.orders.instance_for(user.clone());
        let attributes = AttributeTree::new().with("status", "shipped");
        if !manager.update(&id.0, attributes, Options::new())? {
            return Err(rejected(ORDER, &manager));
        }
        let order = Order::try_from(written_record(&manager)?)?;
        info!(order_id = %order.id, "Order shipped");
        Ok(order)
    }

    /// Deletes an order, returning its stock and removing its line items.
    ///
    /// `Ok(false)` when the order may not be destroyed (e.g. it has shipped);
    /// stock is then left untouched.
    pub fn cancel_order(&self, user: &MockUser, id: OrderId) -> Result<bool, SampleError> {
        let mut manager = self.orders.instance_for(user.clone());
        let written = manager.delete_with(&id.0, Options::new(), |_| self.release_stock(id))?;
        if written {
            info!(order_id = %id, "Order cancelled");
        } else {
            warn!(order_id = %id, errors = ?manager.errors(), "Order not cancelled");
        }
        Ok(written)
    }

    fn release_stock(&self, order: OrderId) -> Result<(), ManagerError> {
        let items = self.backend.filter(
            self.backend.scope(&EntityType::new(LINE_ITEM)),
            &Condition::new("order_id", Predicate::Eq, order.0),
        );
        let products = self.backend.scope(&EntityType::new(PRODUCT));
        for mut item in self.backend.load(&items) {
            let product_id = whole(&item, "product_id").unwrap_or_default();
            let quantity = whole(&item, "quantity").unwrap_or_default();
            let mut product = self.backend.find_by_id(&products, &product_id)?;
            let stock = whole(&product, "quantity").unwrap_or_default();
            self.backend.assign(
                &mut product,
                &AttributeTree::new().with("quantity", stock + quantity),
            );
            self.backend.save_or_fail(&mut product)?;
            self.backend.destroy_or_fail(&mut item)?;
        }
        Ok(())
    }
}
