//! # Manager Type Builder
//!
//! A [`ManagerType`] is the definition-time half of a manager: the bound
//! entity type, the enabled actions, the defaults registry and one adapter per
//! collaborator category. It is built once by [`ManagerBuilder`] and never
//! changes afterwards; cloning it is cheap and shares the same definition.
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_manager::backend::SemanticType;
//! use resource_manager::mock::{MockBackend, MockSchema};
//! use resource_manager::{Action, ManagerType, OptionKey};
//!
//! struct ProductManager;
//!
//! let schema = MockSchema::new().entity("Product", |e| e.attribute("name", SemanticType::String));
//! let backend = Arc::new(MockBackend::new(schema));
//!
//! let products = ManagerType::builder(backend)
//!     .for_type::<ProductManager>()
//!     .only([Action::List, Action::Read])
//!     .default(OptionKey::Order, Action::List, "name")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(products.entity().map(|e| e.name()), Some("Product"));
//! assert!(!products.actions().contains(Action::Delete));
//! ```
//!
//! ## Adapter selection
//!
//! An adapter passed to the builder always wins. Otherwise the configuration
//! snapshot decides: `none` and the built-in choices map to [`AllowAll`],
//! [`PolicyAuthorizer`], [`NoSearch`], [`PredicateSearch`], [`Unpaged`] and
//! [`OffsetPaginator`]. Selecting `policy` without a [`Policy`], or `custom`
//! without an adapter, fails the build with [`ConfigError::MissingAdapter`].
//!
//! ## Entity binding
//!
//! [`ManagerBuilder::entity`] binds explicitly. Without it the entity type is
//! inferred from the manager's name: the last path segment with the configured
//! suffix stripped (`catalog::ProductManager` becomes `Product`), resolved
//! through the backend schema. An unresolvable name leaves the type unbound;
//! building still succeeds and every action on it fails with
//! [`ManagerError::UnboundEntity`](crate::ManagerError::UnboundEntity).

use crate::action::{Action, ActionSet};
use crate::adapters::{
    AllowAll, Authorizer, NoSearch, OffsetPaginator, Paginator, Policy, PolicyAuthorizer,
    PredicateSearch, Searcher, Unpaged,
};
use crate::backend::{Backend, EntityType};
use crate::config::{
    self, AuthorizationChoice, DecimalSeparator, EagerLoading, ManagerConfig, PaginationChoice,
    SearchChoice,
};
use crate::defaults::{ActionScope, DefaultContext, DefaultValue, DefaultsRegistry};
use crate::error::ConfigError;
use crate::options::OptionKey;
use crate::pipeline::Manager;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A built manager type.
pub struct ManagerType<B: Backend> {
    inner: Arc<TypeInner<B>>,
}

struct TypeInner<B: Backend> {
    name: String,
    entity: Option<EntityType>,
    actions: ActionSet,
    defaults: DefaultsRegistry<B>,
    authorizer: Arc<dyn Authorizer<B>>,
    searcher: Arc<dyn Searcher<B>>,
    paginator: Arc<dyn Paginator<B>>,
    config: ManagerConfig,
    eager_loading: EagerLoading,
    backend: Arc<B>,
}

impl<B: Backend> Clone for ManagerType<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> fmt::Debug for ManagerType<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerType")
            .field("name", &self.inner.name)
            .field("entity", &self.inner.entity)
            .field("actions", &self.inner.actions)
            .field("defaults", &self.inner.defaults)
            .field("eager_loading", &self.inner.eager_loading)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> ManagerType<B> {
    pub fn builder(backend: Arc<B>) -> ManagerBuilder<B> {
        ManagerBuilder::new(backend)
    }

    /// A builder for a derived type. It starts from a copy of this type's
    /// defaults, actions, adapters, configuration and entity binding; changes
    /// made through it never reach this type.
    pub fn extend(&self, name: impl Into<String>) -> ManagerBuilder<B> {
        let inner = &self.inner;
        ManagerBuilder {
            backend: Arc::clone(&inner.backend),
            name: Some(name.into()),
            entity: inner.entity.as_ref().map(|e| e.name().to_string()),
            actions: inner.actions,
            defaults: inner.defaults.clone(),
            authorizer: Some(Arc::clone(&inner.authorizer)),
            policy: None,
            searcher: Some(Arc::clone(&inner.searcher)),
            paginator: Some(Arc::clone(&inner.paginator)),
            config: Some(inner.config.clone()),
            eager_loading: Some(inner.eager_loading),
        }
    }

    /// A fresh manager instance with no acting user.
    pub fn instance(&self) -> Manager<B> {
        Manager::new(self.clone(), None)
    }

    /// A fresh manager instance acting as `user`.
    pub fn instance_for(&self, user: B::User) -> Manager<B> {
        Manager::new(self.clone(), Some(user))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn entity(&self) -> Option<&EntityType> {
        self.inner.entity.as_ref()
    }

    pub fn actions(&self) -> ActionSet {
        self.inner.actions
    }

    pub fn defaults(&self) -> &DefaultsRegistry<B> {
        &self.inner.defaults
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// The configuration snapshot taken when the type was built.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn eager_loading(&self) -> EagerLoading {
        self.inner.eager_loading
    }

    pub fn decimal_separator(&self) -> DecimalSeparator {
        self.inner.config.decimal_separator
    }

    pub(crate) fn authorizer(&self) -> &dyn Authorizer<B> {
        self.inner.authorizer.as_ref()
    }

    pub(crate) fn searcher(&self) -> &dyn Searcher<B> {
        self.inner.searcher.as_ref()
    }

    pub(crate) fn paginator(&self) -> &dyn Paginator<B> {
        self.inner.paginator.as_ref()
    }
}

/// Assembles a [`ManagerType`].
pub struct ManagerBuilder<B: Backend> {
    backend: Arc<B>,
    name: Option<String>,
    entity: Option<String>,
    actions: ActionSet,
    defaults: DefaultsRegistry<B>,
    authorizer: Option<Arc<dyn Authorizer<B>>>,
    policy: Option<Arc<dyn Policy<B>>>,
    searcher: Option<Arc<dyn Searcher<B>>>,
    paginator: Option<Arc<dyn Paginator<B>>>,
    config: Option<ManagerConfig>,
    eager_loading: Option<EagerLoading>,
}

impl<B: Backend> ManagerBuilder<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            name: None,
            entity: None,
            actions: ActionSet::all(),
            defaults: DefaultsRegistry::new(),
            authorizer: None,
            policy: None,
            searcher: None,
            paginator: None,
            config: None,
            eager_loading: None,
        }
    }

    /// Names the manager type (used for entity inference and in logs).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Names the manager type after the Rust type `M`.
    pub fn for_type<M: ?Sized>(self) -> Self {
        self.named(short_type_name(std::any::type_name::<M>()))
    }

    /// Binds the entity type explicitly, skipping inference.
    pub fn entity(mut self, name: impl Into<String>) -> Self {
        self.entity = Some(name.into());
        self
    }

    pub fn actions(mut self, actions: ActionSet) -> Self {
        self.actions = actions;
        self
    }

    pub fn only(self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions(ActionSet::only(actions))
    }

    pub fn except(self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions(ActionSet::except(actions))
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer<B> + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    pub fn policy(mut self, policy: impl Policy<B> + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn searcher(mut self, searcher: impl Searcher<B> + 'static) -> Self {
        self.searcher = Some(Arc::new(searcher));
        self
    }

    pub fn paginator(mut self, paginator: impl Paginator<B> + 'static) -> Self {
        self.paginator = Some(Arc::new(paginator));
        self
    }

    /// Uses `config` instead of a snapshot of the process-wide registry.
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the configured eager-loading strategy for this type.
    pub fn eager_loading(mut self, strategy: EagerLoading) -> Self {
        self.eager_loading = Some(strategy);
        self
    }

    /// Registers a static or deferred default.
    pub fn default(
        mut self,
        key: OptionKey,
        scope: impl Into<ActionScope>,
        value: impl Into<DefaultValue<B>>,
    ) -> Self {
        self.defaults.register(key, scope, value);
        self
    }

    /// Registers a default computed per invocation.
    pub fn deferred_default<F>(self, key: OptionKey, scope: impl Into<ActionScope>, f: F) -> Self
    where
        F: Fn(&DefaultContext<'_, B>) -> Value + Send + Sync + 'static,
    {
        self.default(key, scope, DefaultValue::deferred(f))
    }

    /// Registers an action-scoped map such as `{all: 25, list: 50}`.
    pub fn defaults_map<I, V>(mut self, key: OptionKey, scoped: I) -> Self
    where
        I: IntoIterator<Item = (ActionScope, V)>,
        V: Into<DefaultValue<B>>,
    {
        self.defaults.register_map(key, scoped);
        self
    }

    pub fn build(self) -> Result<ManagerType<B>, ConfigError> {
        let config = self.config.unwrap_or_else(config::current);

        let authorizer: Arc<dyn Authorizer<B>> = match (self.authorizer, self.policy) {
            (Some(custom), _) => custom,
            (None, Some(policy)) => Arc::new(PolicyAuthorizer::new(policy)),
            (None, None) => match config.authorization {
                AuthorizationChoice::None => Arc::new(AllowAll),
                AuthorizationChoice::Policy | AuthorizationChoice::Custom => {
                    return Err(ConfigError::MissingAdapter {
                        category: "authorization",
                    })
                }
            },
        };
        let searcher: Arc<dyn Searcher<B>> = match self.searcher {
            Some(custom) => custom,
            None => match config.search {
                SearchChoice::None => Arc::new(NoSearch),
                SearchChoice::Predicate => Arc::new(PredicateSearch),
                SearchChoice::Custom => {
                    return Err(ConfigError::MissingAdapter { category: "search" })
                }
            },
        };
        let paginator: Arc<dyn Paginator<B>> = match self.paginator {
            Some(custom) => custom,
            None => match config.pagination {
                PaginationChoice::None => Arc::new(Unpaged),
                PaginationChoice::Offset => Arc::new(OffsetPaginator),
                PaginationChoice::Custom => {
                    return Err(ConfigError::MissingAdapter {
                        category: "pagination",
                    })
                }
            },
        };

        let name = match self.name {
            Some(name) => name,
            None => match &self.entity {
                Some(entity) => format!("{entity}{}", config.type_suffix),
                None => config.type_suffix.clone(),
            },
        };
        let entity = match self.entity {
            Some(explicit) => Some(
                self.backend
                    .schema()
                    .entity_type(&explicit)
                    .unwrap_or_else(|| EntityType::new(explicit)),
            ),
            None => infer_entity(self.backend.as_ref(), &name, &config.type_suffix),
        };

        match &entity {
            Some(entity) => info!(manager = %name, %entity, "Manager type built"),
            None => warn!(manager = %name, "Manager type built without an entity type"),
        }

        Ok(ManagerType {
            inner: Arc::new(TypeInner {
                name,
                entity,
                actions: self.actions,
                defaults: self.defaults,
                authorizer,
                searcher,
                paginator,
                eager_loading: self.eager_loading.unwrap_or(config.eager_loading),
                config,
                backend: self.backend,
            }),
        })
    }
}

/// `a::b::Thing<T>` becomes `Thing`.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn infer_entity<B: Backend>(backend: &B, manager: &str, suffix: &str) -> Option<EntityType> {
    let candidate = short_type_name(manager);
    let candidate = candidate.strip_suffix(suffix).unwrap_or(candidate);
    if candidate.is_empty() {
        return None;
    }
    let entity = backend.schema().entity_type(candidate);
    debug!(manager, candidate, found = entity.is_some(), "Inferring entity type");
    entity
}
