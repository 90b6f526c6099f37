//! # System Wiring
//!
//! Manager types are plain values, so "starting" the system means building
//! one backend and defining every manager type over it. [`CatalogSystem`]
//! does that once and then exposes the workflows a storefront needs.
//!
//! ```rust
//! use manager_sample::lifecycle::CatalogSystem;
//! use manager_sample::model::{OrderLine, ProductCreate};
//! use resource_manager::mock::MockUser;
//!
//! let system = CatalogSystem::new().unwrap();
//! let staff = MockUser::new(1, "staff");
//! let alice = MockUser::new(7, "customer");
//!
//! let widget = system
//!     .add_product(&staff, ProductCreate {
//!         name: "Widget".into(),
//!         price: "12.50".into(),
//!         quantity: 10,
//!     })
//!     .unwrap();
//!
//! let order = system.place_order(&alice, &[OrderLine::new(widget, 2)]).unwrap();
//! assert_eq!(system.order(&alice, order).unwrap().total, 25.0);
//! ```
//!
//! ## Transactions
//!
//! `place_order` runs inside one backend transaction. The order's own
//! `create` action nests a second one in which the stock of each product is
//! reserved before the order is saved. Any failure rolls back the stock, the
//! order and the line items together.
//!
//! ## Acting users
//!
//! Every workflow takes the acting user and runs the action on an instance
//! created for that user. Staff tooling that needs to act on behalf of a
//! customer goes through [`Manager::with_user`](resource_manager::Manager::with_user).

pub mod catalog_system;

pub use catalog_system::*;
