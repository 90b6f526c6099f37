//! # Default Resolver
//!
//! Manager types declare option defaults once, at definition time. A default
//! is registered for one [`OptionKey`] and either every action
//! ([`ActionScope::All`]) or a single action, and is either a static value or a
//! deferred evaluator run against the calling instance.
//!
//! Resolution order for a key during an action:
//!
//! 1. the call-site option,
//! 2. the default registered for that action,
//! 3. the default registered for all actions,
//! 4. absent.
//!
//! Only the winning tier is evaluated, so a deferred default runs at most once
//! per invocation and its result is never cached across invocations.

use crate::action::Action;
use crate::attributes::AttributeTree;
use crate::backend::Backend;
use crate::error::ConfigError;
use crate::options::{OptionKey, Options};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which actions a default applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionScope {
    All,
    Only(Action),
}

impl From<Action> for ActionScope {
    fn from(action: Action) -> Self {
        ActionScope::Only(action)
    }
}

impl FromStr for ActionScope {
    type Err = ConfigError;

    /// `"all"` or an action name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ActionScope::All)
        } else {
            s.parse().map(ActionScope::Only)
        }
    }
}

/// What a deferred default can see of the calling instance.
pub struct DefaultContext<'a, B: Backend> {
    pub action: Action,
    pub attributes: &'a AttributeTree,
    pub options: &'a Options,
    pub user: Option<&'a B::User>,
}

type Evaluator<B> = Arc<dyn Fn(&DefaultContext<'_, B>) -> Value + Send + Sync>;

/// A default value: static, or computed per invocation.
pub enum DefaultValue<B: Backend> {
    Static(Value),
    Deferred(Evaluator<B>),
}

impl<B: Backend> DefaultValue<B> {
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&DefaultContext<'_, B>) -> Value + Send + Sync + 'static,
    {
        DefaultValue::Deferred(Arc::new(f))
    }

    fn evaluate(&self, ctx: &DefaultContext<'_, B>) -> Value {
        match self {
            DefaultValue::Static(v) => v.clone(),
            DefaultValue::Deferred(f) => f(ctx),
        }
    }
}

impl<B: Backend> Clone for DefaultValue<B> {
    fn clone(&self) -> Self {
        match self {
            DefaultValue::Static(v) => DefaultValue::Static(v.clone()),
            DefaultValue::Deferred(f) => DefaultValue::Deferred(Arc::clone(f)),
        }
    }
}

impl<B: Backend> fmt::Debug for DefaultValue<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

macro_rules! static_default_from {
    ($($ty:ty),+) => {
        $(
            impl<B: Backend> From<$ty> for DefaultValue<B> {
                fn from(value: $ty) -> Self {
                    DefaultValue::Static(Value::from(value))
                }
            }
        )+
    };
}

static_default_from!(Value, &str, String, bool, i32, i64, u64);

/// Per-manager-type store of option defaults.
///
/// Cloning yields an independent registry; a derived manager type always works
/// on its own copy.
pub struct DefaultsRegistry<B: Backend> {
    entries: BTreeMap<OptionKey, BTreeMap<ActionScope, DefaultValue<B>>>,
}

impl<B: Backend> Default for DefaultsRegistry<B> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<B: Backend> Clone for DefaultsRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for DefaultsRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<B: Backend> DefaultsRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the default for `key` within `scope`.
    pub fn register(
        &mut self,
        key: OptionKey,
        scope: impl Into<ActionScope>,
        value: impl Into<DefaultValue<B>>,
    ) {
        self.entries
            .entry(key)
            .or_default()
            .insert(scope.into(), value.into());
    }

    /// Registers an action-scoped map in one go, e.g. `{all: 25, list: 50}`.
    pub fn register_map<I, V>(&mut self, key: OptionKey, scoped: I)
    where
        I: IntoIterator<Item = (ActionScope, V)>,
        V: Into<DefaultValue<B>>,
    {
        for (scope, value) in scoped {
            self.register(key, scope, value);
        }
    }

    pub fn contains(&self, key: OptionKey, scope: ActionScope) -> bool {
        self.entries
            .get(&key)
            .is_some_and(|scoped| scoped.contains_key(&scope))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Class-level default for `key` during `action` (tiers 2 and 3 only).
    pub fn default_for(&self, key: OptionKey, ctx: &DefaultContext<'_, B>) -> Option<Value> {
        let scoped = self.entries.get(&key)?;
        scoped
            .get(&ActionScope::Only(ctx.action))
            .or_else(|| scoped.get(&ActionScope::All))
            .map(|value| value.evaluate(ctx))
    }

    /// Full resolution for `key`: call-site option first, then the defaults.
    pub fn resolve(&self, key: OptionKey, ctx: &DefaultContext<'_, B>) -> Option<Value> {
        match ctx.options.get(key) {
            Some(explicit) => Some(explicit.clone()),
            None => self.default_for(key, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx<'a>(
        action: Action,
        attributes: &'a AttributeTree,
        options: &'a Options,
    ) -> DefaultContext<'a, MockBackend> {
        DefaultContext {
            action,
            attributes,
            options,
            user: None,
        }
    }

    #[test]
    fn test_precedence_with_all_tiers_populated() {
        let mut registry = DefaultsRegistry::<MockBackend>::new();
        registry.register(OptionKey::PerPage, ActionScope::All, 10);
        registry.register(OptionKey::PerPage, Action::List, 50);

        let attrs = AttributeTree::new();
        let explicit = Options::new().per_page(5);
        let none = Options::new();

        // 1. call site
        assert_eq!(
            registry.resolve(OptionKey::PerPage, &ctx(Action::List, &attrs, &explicit)),
            Some(json!(5))
        );
        // 2. action-scoped
        assert_eq!(
            registry.resolve(OptionKey::PerPage, &ctx(Action::List, &attrs, &none)),
            Some(json!(50))
        );
        // 3. all actions
        assert_eq!(
            registry.resolve(OptionKey::PerPage, &ctx(Action::Read, &attrs, &none)),
            Some(json!(10))
        );
        // 4. absent
        assert_eq!(
            registry.resolve(OptionKey::Select, &ctx(Action::Read, &attrs, &none)),
            None
        );
    }

    #[test]
    fn test_deferred_defaults_run_once_per_resolution_and_only_when_they_win() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = DefaultsRegistry::<MockBackend>::new();
        registry.register(
            OptionKey::Order,
            ActionScope::All,
            DefaultValue::deferred(move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                json!([format!("{}_at", ctx.action)])
            }),
        );

        let attrs = AttributeTree::new();
        let none = Options::new();
        let resolved = registry.resolve(OptionKey::Order, &ctx(Action::Update, &attrs, &none));
        assert_eq!(resolved, Some(json!(["update_at"])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let explicit = Options::new().order(["name"]);
        registry.resolve(OptionKey::Order, &ctx(Action::Update, &attrs, &explicit));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        registry.resolve(OptionKey::Order, &ctx(Action::Update, &attrs, &none));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deferred_defaults_see_the_instance_attributes() {
        let mut registry = DefaultsRegistry::<MockBackend>::new();
        registry.register(
            OptionKey::Attributes,
            Action::Create,
            DefaultValue::deferred(|ctx| {
                let name = ctx
                    .attributes
                    .get("name")
                    .and_then(|v| v.as_text())
                    .unwrap_or("untitled");
                json!({ "slug": name.to_lowercase() })
            }),
        );
        let attrs = AttributeTree::new().with("name", "Widget");
        let none = Options::new();
        assert_eq!(
            registry.resolve(OptionKey::Attributes, &ctx(Action::Create, &attrs, &none)),
            Some(json!({"slug": "widget"}))
        );
        assert_eq!(
            registry.resolve(OptionKey::Attributes, &ctx(Action::New, &attrs, &none)),
            None
        );
    }

    #[test]
    fn test_clones_are_independent() {
        let mut base = DefaultsRegistry::<MockBackend>::new();
        base.register(OptionKey::PerPage, ActionScope::All, 10);

        let mut child = base.clone();
        child.register(OptionKey::PerPage, ActionScope::All, 99);
        child.register(OptionKey::Order, ActionScope::All, "name");

        assert!(!base.contains(OptionKey::Order, ActionScope::All));
        let attrs = AttributeTree::new();
        let none = Options::new();
        assert_eq!(
            base.resolve(OptionKey::PerPage, &ctx(Action::List, &attrs, &none)),
            Some(json!(10))
        );
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("all".parse::<ActionScope>().unwrap(), ActionScope::All);
        assert_eq!(
            "list".parse::<ActionScope>().unwrap(),
            ActionScope::Only(Action::List)
        );
        assert!("everything".parse::<ActionScope>().is_err());
    }
}
