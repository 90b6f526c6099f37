//! # Resource Manager
//!
//! A uniform lifecycle for entity types sitting between a presentation layer
//! and a persistence backend. Every entity gets the same seven actions:
//!
//! | Action | Operation |
//! |--------|-----------|
//! | `list` | filtered, ordered, paginated scope |
//! | `read` | one record by id |
//! | `new` | unsaved template record |
//! | `create` | build and persist, atomically |
//! | `edit` | one record by id, for editing |
//! | `update` | assign and persist |
//! | `delete` | destroy, atomically |
//!
//! Each action is a fixed sequence of stages (see [`Action::stages`]) rather
//! than per-entity code.
//!
//! ## Architecture
//!
//! 1. **Configuration** ([`config`]) - process-wide, validated choice of
//!    adapters, eager-loading strategy, name suffix and decimal separator.
//! 2. **Definition** ([`ManagerType`], [`ManagerBuilder`]) - binds an entity
//!    type, enables actions, registers defaults ([`DefaultsRegistry`]) and
//!    picks one adapter per collaborator category ([`adapters`]).
//! 3. **Execution** ([`Manager`]) - one instance per operation; walks the
//!    stage table, normalizing input ([`normalizer`]) and resolving options
//!    against defaults on the way.
//!
//! The backend itself is a trait ([`Backend`]); [`mock::MockBackend`] is an
//! in-memory implementation for tests and demos.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_manager::backend::SemanticType;
//! use resource_manager::config::ManagerConfig;
//! use resource_manager::mock::{MockBackend, MockSchema};
//! use resource_manager::{AttributeTree, ManagerType, OptionKey, Options};
//!
//! let schema = MockSchema::new().entity("Product", |e| {
//!     e.attribute("name", SemanticType::String)
//!         .attribute("price", SemanticType::Decimal)
//! });
//! let backend = Arc::new(MockBackend::new(schema));
//!
//! let products = ManagerType::builder(Arc::clone(&backend))
//!     .entity("Product")
//!     .with_config(ManagerConfig::default())
//!     .default(OptionKey::Order, resource_manager::ActionScope::All, "name")
//!     .build()
//!     .unwrap();
//!
//! let mut manager = products.instance();
//! assert!(manager.create(AttributeTree::new().with("name", "Widget")).unwrap());
//!
//! let scope = manager.list(Options::new()).unwrap();
//! assert_eq!(backend.load(&scope).len(), 1);
//! ```

pub mod action;
pub mod adapters;
pub mod attributes;
pub mod backend;
pub mod config;
pub mod defaults;
pub mod error;
pub mod manager_type;
pub mod mock;
pub mod normalizer;
pub mod options;
pub mod pipeline;
pub mod tracing;

pub use action::{Action, ActionSet, PipelineState, Stage};
pub use attributes::{AttrValue, AttributeTree};
pub use backend::{Backend, EntityType, Schema};
pub use config::ManagerConfig;
pub use defaults::{ActionScope, DefaultContext, DefaultValue, DefaultsRegistry};
pub use error::{ConfigError, ManagerError};
pub use manager_type::{ManagerBuilder, ManagerType};
pub use options::{OptionKey, Options, OrderTerm};
pub use pipeline::{ActingAs, Manager, Target};
