//! # Action Pipeline Engine
//!
//! A [`Manager`] is one in-flight operation against a [`ManagerType`]. Every
//! public action walks the stage table from [`Action::stages`], updating
//! [`PipelineState`] as it goes and keeping the entity or collection it works
//! on in [`Target`].
//!
//! ## Failure handling
//!
//! - Authorization denial stops the pipeline, clears the target and returns
//!   [`ManagerError::AuthorizationDenied`]. It is never turned into `false`.
//! - `create` and `delete` run their extension and write inside one atomic
//!   unit. Validation and persistence failures roll the unit back and the
//!   action returns `Ok(false)`; the record and its errors stay on the target.
//! - `update` uses the non-raising save and returns its result directly.
//!
//! ## Extensions
//!
//! Each action has a `*_with` variant taking a caller extension. It runs at a
//! fixed point: before the lookup for `read`/`edit`, after authorization for
//! `new`, inside the atomic unit for `create`/`delete`, and after attribute
//! assignment for `update`. It receives the target and may change it.
//!
//! A manager is stateful and is not meant to be shared between concurrent
//! operations; each worker builds its own with [`ManagerType::instance`].

use crate::action::{Action, PipelineState, Stage};
use crate::adapters::{Subject, DEFAULT_PAGE_SIZE};
use crate::attributes::AttributeTree;
use crate::backend::{Backend, EntityType};
use crate::defaults::DefaultContext;
use crate::error::ManagerError;
use crate::manager_type::ManagerType;
use crate::normalizer::normalize;
use crate::options::{
    association_paths, order_terms, page_spec, string_list, unsigned, OptionKey, Options,
};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, info_span, warn};

/// What the current action operates on.
pub enum Target<B: Backend> {
    Unset,
    Scope(B::Query),
    Record(B::Record),
}

impl<B: Backend> Target<B> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Target::Unset)
    }

    pub fn scope(&self) -> Option<&B::Query> {
        match self {
            Target::Scope(q) => Some(q),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&B::Record> {
        match self {
            Target::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut B::Record> {
        match self {
            Target::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Replaces the current scope; a no-op on anything but a scope.
    pub fn map_scope(&mut self, f: impl FnOnce(B::Query) -> B::Query) {
        if let Target::Scope(q) = std::mem::replace(self, Target::Unset) {
            *self = Target::Scope(f(q));
        }
    }
}

impl<B: Backend> fmt::Debug for Target<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Unset => f.write_str("Unset"),
            Target::Scope(q) => f.debug_tuple("Scope").field(q).finish(),
            Target::Record(r) => f.debug_tuple("Record").field(r).finish(),
        }
    }
}

/// A caller-supplied step.
pub type Extension<'a, B> = Box<dyn FnOnce(&mut Target<B>) -> Result<(), ManagerError> + 'a>;

/// Option keys each action reads; only these are resolved against defaults.
fn consumed_keys(action: Action) -> &'static [OptionKey] {
    use OptionKey::*;
    match action {
        Action::List => &[Search, Order, Scopes, Page, PerPage, Includes, Select, Distinct],
        Action::Read | Action::Edit => &[Includes, Select],
        Action::Update | Action::Delete => &[Includes],
        Action::New | Action::Create => &[Attributes],
    }
}

/// Per-invocation inputs that do not live on the manager.
struct Invocation<'a, B: Backend> {
    id: Option<&'a B::Id>,
    extension: Option<Extension<'a, B>>,
    written: bool,
}

/// A manager instance: one logical operation at a time.
pub struct Manager<B: Backend> {
    manager_type: ManagerType<B>,
    user: Option<B::User>,
    action: Option<Action>,
    attributes: AttributeTree,
    options: Options,
    explicit_order: bool,
    search_sorted: bool,
    target: Target<B>,
    state: PipelineState,
    trail: Vec<Stage>,
}

impl<B: Backend> fmt::Debug for Manager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("type", &self.manager_type.name())
            .field("user", &self.user)
            .field("action", &self.action)
            .field("state", &self.state)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Manager<B> {
    pub fn new(manager_type: ManagerType<B>, user: Option<B::User>) -> Self {
        Self {
            manager_type,
            user,
            action: None,
            attributes: AttributeTree::new(),
            options: Options::new(),
            explicit_order: false,
            search_sorted: false,
            target: Target::Unset,
            state: PipelineState::Idle,
            trail: Vec::new(),
        }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Builds the filtered, ordered and paged scope for the entity type.
    pub fn list(&mut self, options: Options) -> Result<B::Query, ManagerError> {
        self.run(Action::List, None, AttributeTree::new(), options, None)?;
        self.scope_result(Action::List)
    }

    pub fn read_one(&mut self, id: &B::Id, options: Options) -> Result<B::Record, ManagerError> {
        self.run(Action::Read, Some(id), AttributeTree::new(), options, None)?;
        self.record_result(Action::Read)
    }

    pub fn read_one_with<F>(
        &mut self,
        id: &B::Id,
        options: Options,
        extension: F,
    ) -> Result<B::Record, ManagerError>
    where
        F: FnOnce(&mut Target<B>) -> Result<(), ManagerError>,
    {
        self.run(Action::Read, Some(id), AttributeTree::new(), options, Some(Box::new(extension)))?;
        self.record_result(Action::Read)
    }

    /// An unsaved record built from defaults and `attributes`.
    pub fn new_template(&mut self, attributes: AttributeTree) -> Result<B::Record, ManagerError> {
        self.run(Action::New, None, attributes, Options::new(), None)?;
        self.record_result(Action::New)
    }

    pub fn new_template_with<F>(
        &mut self,
        attributes: AttributeTree,
        extension: F,
    ) -> Result<B::Record, ManagerError>
    where
        F: FnOnce(&mut Target<B>) -> Result<(), ManagerError>,
    {
        self.run(Action::New, None, attributes, Options::new(), Some(Box::new(extension)))?;
        self.record_result(Action::New)
    }

    /// `Ok(false)` when validation or persistence fails; see [`Manager::errors`].
    pub fn create(&mut self, attributes: AttributeTree) -> Result<bool, ManagerError> {
        self.run(Action::Create, None, attributes, Options::new(), None)
    }

    pub fn create_with<F>(
        &mut self,
        attributes: AttributeTree,
        extension: F,
    ) -> Result<bool, ManagerError>
    where
        F: FnOnce(&mut Target<B>) -> Result<(), ManagerError>,
    {
        self.run(
            Action::Create,
            None,
            attributes,
            Options::new(),
            Some(Box::new(extension)),
        )
    }

    pub fn edit_template(
        &mut self,
        id: &B::Id,
        options: Options,
    ) -> Result<B::Record, ManagerError> {
        self.run(Action::Edit, Some(id), AttributeTree::new(), options, None)?;
        self.record_result(Action::Edit)
    }

    pub fn edit_template_with<F>(
        &mut self,
        id: &B::Id,
        options: Options,
        extension: F,
    ) -> Result<B::Record, ManagerError>
    where
        F: FnOnce(&mut Target<B>) -> Result<(), ManagerError>,
    {
        self.run(Action::Edit, Some(id), AttributeTree::new(), options, Some(Box::new(extension)))?;
        self.record_result(Action::Edit)
    }

    pub fn update(
        &mut self,
        id: &B::Id,
        attributes: AttributeTree,
        options: Options,
    ) -> Result<bool, ManagerError> {
        self.run(Action::Update, Some(id), attributes, options, None)
    }

    pub fn update_with<F>(
        &mut self,
        id: &B::Id,
        attributes: AttributeTree,
        options: Options,
        extension: F,
    ) -> Result<bool, ManagerError>
    where
        F: FnOnce(&mut Target<B>) -> Result<(), ManagerError>,
    {
        self.run(Action::Update, Some(id), attributes, options, Some(Box::new(extension)))
    }

    pub fn delete(&mut self, id: &B::Id, options: Options) -> Result<bool, ManagerError> {
        self.run(Action::Delete, Some(id), AttributeTree::new(), options, None)
    }

    pub fn delete_with<F>(
        &mut self,
        id: &B::Id,
        options: Options,
        extension: F,
    ) -> Result<bool, ManagerError>
    where
        F: FnOnce(&mut Target<B>) -> Result<(), ManagerError>,
    {
        self.run(Action::Delete, Some(id), AttributeTree::new(), options, Some(Box::new(extension)))
    }

    // =========================================================================
    // ACTING USER
    // =========================================================================

    pub fn user(&self) -> Option<&B::User> {
        self.user.as_ref()
    }

    /// Acts as `user` until the returned guard drops. The previous user is
    /// restored on every exit path, unwinding included.
    pub fn acting_as(&mut self, user: B::User) -> ActingAs<'_, B> {
        let previous = self.user.replace(user);
        ActingAs {
            manager: self,
            previous,
        }
    }

    /// Runs `f` acting as `user`.
    pub fn with_user<R>(&mut self, user: B::User, f: impl FnOnce(&mut Manager<B>) -> R) -> R {
        let mut guard = self.acting_as(user);
        f(&mut guard)
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    pub fn manager_type(&self) -> &ManagerType<B> {
        &self.manager_type
    }

    /// The action of the current or last invocation.
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Stages entered by the last invocation, in order.
    pub fn trail(&self) -> &[Stage] {
        &self.trail
    }

    pub fn target(&self) -> &Target<B> {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut Target<B> {
        &mut self.target
    }

    /// Normalized attributes of the last invocation.
    pub fn attributes(&self) -> &AttributeTree {
        &self.attributes
    }

    /// Options of the last invocation after defaults were merged in.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Errors accumulated on the target record.
    pub fn errors(&self) -> Vec<String> {
        self.target
            .record()
            .map(|r| self.manager_type.backend().record_errors(r))
            .unwrap_or_default()
    }

    // =========================================================================
    // ENGINE
    // =========================================================================

    fn run(
        &mut self,
        action: Action,
        id: Option<&B::Id>,
        attributes: AttributeTree,
        options: Options,
        extension: Option<Extension<'_, B>>,
    ) -> Result<bool, ManagerError> {
        let ty = self.manager_type.clone();
        let span = info_span!(
            "action",
            manager = %ty.name(),
            entity = ty.entity().map(EntityType::name).unwrap_or("-"),
            %action
        );
        let _enter = span.enter();

        self.action = Some(action);
        self.trail.clear();
        self.target = Target::Unset;
        self.attributes = AttributeTree::new();
        self.options = Options::new();

        if !ty.actions().contains(action) {
            self.state = PipelineState::Aborted;
            return Err(ManagerError::ActionNotEnabled {
                manager: ty.name().to_string(),
                action,
            });
        }
        let Some(entity) = ty.entity().cloned() else {
            self.state = PipelineState::Aborted;
            return Err(ManagerError::UnboundEntity {
                manager: ty.name().to_string(),
            });
        };

        let mut call = Invocation {
            id,
            extension,
            written: false,
        };
        let mut raw = Some((attributes, options));

        for &stage in action.stages() {
            self.trail.push(stage);
            debug!(?stage, "Stage");
            let outcome = match stage {
                Stage::Reset => {
                    let (attributes, options) = raw.take().unwrap_or_default();
                    self.reset(&ty, &entity, action, attributes, options);
                    Ok(())
                }
                _ => self.stage(&ty, &entity, action, stage, &mut call),
            };
            if let Err(e) = outcome {
                return Err(self.fail(e));
            }
        }

        if !self.state.is_terminal() {
            self.state = PipelineState::Committed;
        }
        info!(state = ?self.state, written = call.written, "Completed");
        Ok(call.written)
    }

    fn fail(&mut self, error: ManagerError) -> ManagerError {
        if error.is_authorization_denied() {
            self.target = Target::Unset;
            self.state = PipelineState::Denied;
            warn!(error = %error, "Denied");
        } else {
            self.state = PipelineState::Aborted;
            warn!(error = %error, "Aborted");
        }
        error
    }

    /// Clears per-call state, resolves options and normalizes attributes.
    fn reset(
        &mut self,
        ty: &ManagerType<B>,
        entity: &EntityType,
        action: Action,
        attributes: AttributeTree,
        options: Options,
    ) {
        self.target = Target::Unset;
        self.search_sorted = false;
        self.explicit_order = options.contains(OptionKey::Order);
        self.state = PipelineState::Reset;

        let ctx = DefaultContext {
            action,
            attributes: &attributes,
            options: &options,
            user: self.user.as_ref(),
        };
        let mut resolved = Options::new();
        for &key in consumed_keys(action) {
            if let Some(value) = ty.defaults().resolve(key, &ctx) {
                resolved.insert(key, value);
            }
        }

        let merged = match resolved.get(OptionKey::Attributes) {
            Some(defaults) => AttributeTree::from(defaults.clone()).merged(&attributes),
            None => attributes,
        };
        self.attributes = normalize(
            ty.backend().schema(),
            entity,
            &merged,
            ty.decimal_separator(),
        );
        self.options = resolved;
    }

    fn stage(
        &mut self,
        ty: &ManagerType<B>,
        entity: &EntityType,
        action: Action,
        stage: Stage,
        call: &mut Invocation<'_, B>,
    ) -> Result<(), ManagerError> {
        let backend = ty.backend();
        let user = self.user.as_ref();
        match stage {
            Stage::Reset => {}
            Stage::AuthorizedScope => {
                ty.authorizer().authorize(user, action, &Subject::Type(entity))?;
                let scope = ty.authorizer().scoped_query(user, entity, backend.scope(entity));
                self.target = Target::Scope(scope);
                self.state = PipelineState::Scoped;
            }
            Stage::BaseScope => {
                self.target = Target::Scope(backend.scope(entity));
                self.state = PipelineState::Scoped;
            }
            Stage::Search => {
                if let Some(search) = self.options.get(OptionKey::Search).cloned() {
                    let scope = self.take_scope(action)?;
                    let (scope, sorted) = ty.searcher().apply_search(backend, scope, &search)?;
                    self.search_sorted = sorted;
                    self.target = Target::Scope(scope);
                }
                self.state = PipelineState::Searched;
            }
            Stage::Order => {
                let apply = self.explicit_order || !self.search_sorted;
                match self.options.get(OptionKey::Order) {
                    Some(order) if apply => {
                        let terms = order_terms(OptionKey::Order, order)?;
                        self.target.map_scope(|q| backend.order(q, &terms));
                    }
                    Some(_) => debug!("Default order skipped, search supplied its own"),
                    None => {}
                }
                self.state = PipelineState::Ordered;
            }
            Stage::NamedScopes => {
                if let Some(scopes) = self.options.get(OptionKey::Scopes).cloned() {
                    let mut scope = self.take_scope(action)?;
                    for name in string_list(OptionKey::Scopes, &scopes)? {
                        scope = backend.named_scope(scope, &name)?;
                    }
                    self.target = Target::Scope(scope);
                }
                self.state = PipelineState::Filtered;
            }
            Stage::Paginate => {
                let (number, size) = self.page_request()?;
                if number.is_some() || size.is_some() {
                    let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
                    self.target
                        .map_scope(|q| ty.paginator().paginate(backend, q, number, size));
                    self.state = PipelineState::Paged;
                }
            }
            Stage::EagerLoad => {
                if let Some(includes) = self.options.get(OptionKey::Includes) {
                    let paths = association_paths(OptionKey::Includes, includes)?;
                    if !paths.is_empty() {
                        let strategy = ty.eager_loading();
                        self.target
                            .map_scope(|q| backend.eager_load(q, &paths, strategy));
                    }
                }
            }
            Stage::Select => {
                if let Some(select) = self.options.get(OptionKey::Select) {
                    let columns = string_list(OptionKey::Select, select)?;
                    if !columns.is_empty() {
                        self.target.map_scope(|q| backend.select(q, &columns));
                    }
                }
            }
            Stage::Distinct => {
                if self.options.get(OptionKey::Distinct) == Some(&Value::Bool(true)) {
                    self.target.map_scope(|q| backend.distinct(q));
                }
            }
            Stage::Build => {
                self.target = Target::Record(backend.new_unsaved(entity, &self.attributes));
                self.state = PipelineState::Built;
            }
            Stage::Find => {
                let id = call.id.ok_or(ManagerError::MissingTarget { action })?;
                let scope = self
                    .target
                    .scope()
                    .ok_or(ManagerError::MissingTarget { action })?;
                let record = backend.find_by_id(scope, id)?;
                self.target = Target::Record(record);
                self.state = PipelineState::Found;
            }
            Stage::Authorize => {
                let record = self
                    .target
                    .record()
                    .ok_or(ManagerError::MissingTarget { action })?;
                ty.authorizer()
                    .authorize(user, action, &Subject::Record(entity, record))?;
                self.state = PipelineState::Authorized;
            }
            Stage::Assign => {
                let record = self
                    .target
                    .record_mut()
                    .ok_or(ManagerError::MissingTarget { action })?;
                backend.assign(record, &self.attributes);
            }
            Stage::Extension => {
                if let Some(extension) = call.extension.take() {
                    extension(&mut self.target)?;
                    self.state = PipelineState::Extended;
                }
            }
            Stage::Save => {
                let record = self
                    .target
                    .record_mut()
                    .ok_or(ManagerError::MissingTarget { action })?;
                self.state = PipelineState::Executed;
                call.written = backend.save(record);
                self.state = if call.written {
                    PipelineState::Committed
                } else {
                    warn!(errors = ?backend.record_errors(record), "Save failed");
                    PipelineState::RolledBack
                };
            }
            Stage::AtomicPersist | Stage::AtomicDestroy => {
                let destroy = stage == Stage::AtomicDestroy;
                let target = &mut self.target;
                let mut extension = call.extension.take();
                let mut extended = false;
                let result = backend.run_atomically(&mut || {
                    if let Some(extension) = extension.take() {
                        extension(&mut *target)?;
                        extended = true;
                    }
                    let record = target
                        .record_mut()
                        .ok_or(ManagerError::MissingTarget { action })?;
                    if destroy {
                        backend.destroy_or_fail(record)
                    } else {
                        backend.save_or_fail(record)
                    }
                });
                if extended {
                    self.state = PipelineState::Extended;
                }
                match result {
                    Ok(()) => {
                        call.written = true;
                        self.state = PipelineState::Committed;
                    }
                    Err(e) if e.is_persistence_failure() => {
                        warn!(error = %e, "Rolled back");
                        call.written = false;
                        self.state = PipelineState::RolledBack;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn take_scope(&mut self, action: Action) -> Result<B::Query, ManagerError> {
        match std::mem::replace(&mut self.target, Target::Unset) {
            Target::Scope(q) => Ok(q),
            other => {
                self.target = other;
                Err(ManagerError::MissingTarget { action })
            }
        }
    }

    /// Page number and size from `page`, falling back to `per_page` for the size.
    fn page_request(&self) -> Result<(Option<u64>, Option<u64>), ManagerError> {
        let (number, size) = match self.options.get(OptionKey::Page) {
            Some(page) => page_spec(page)?,
            None => (None, None),
        };
        let size = match size {
            Some(size) => Some(size),
            None => self
                .options
                .get(OptionKey::PerPage)
                .map(|v| unsigned(OptionKey::PerPage.as_str(), v))
                .transpose()?,
        };
        Ok((number, size))
    }

    fn scope_result(&self, action: Action) -> Result<B::Query, ManagerError> {
        self.target
            .scope()
            .cloned()
            .ok_or(ManagerError::MissingTarget { action })
    }

    fn record_result(&self, action: Action) -> Result<B::Record, ManagerError> {
        self.target
            .record()
            .cloned()
            .ok_or(ManagerError::MissingTarget { action })
    }
}

/// Guard returned by [`Manager::acting_as`].
pub struct ActingAs<'m, B: Backend> {
    manager: &'m mut Manager<B>,
    previous: Option<B::User>,
}

impl<B: Backend> Deref for ActingAs<'_, B> {
    type Target = Manager<B>;

    fn deref(&self) -> &Manager<B> {
        self.manager
    }
}

impl<B: Backend> DerefMut for ActingAs<'_, B> {
    fn deref_mut(&mut self) -> &mut Manager<B> {
        self.manager
    }
}

impl<B: Backend> Drop for ActingAs<'_, B> {
    fn drop(&mut self) {
        self.manager.user = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SemanticType;
    use crate::config::ManagerConfig;
    use crate::mock::{MockBackend, MockSchema, MockUser};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;

    fn manager() -> Manager<MockBackend> {
        let schema =
            MockSchema::new().entity("Product", |e| e.attribute("name", SemanticType::String));
        ManagerType::builder(Arc::new(MockBackend::new(schema)))
            .entity("Product")
            .with_config(ManagerConfig::default())
            .build()
            .unwrap()
            .instance()
    }

    #[test]
    fn test_acting_as_restores_the_previous_user() {
        let mut m = manager();
        {
            let guard = m.acting_as(MockUser::new(7, "admin"));
            assert_eq!(guard.user().map(|u| u.id), Some(7));
        }
        assert!(m.user().is_none());

        let seen = m.with_user(MockUser::new(8, "clerk"), |m| m.user().map(|u| u.id));
        assert_eq!(seen, Some(8));
        assert!(m.user().is_none());
    }

    #[test]
    fn test_acting_as_restores_after_a_panic() {
        let mut m = manager();
        let result = catch_unwind(AssertUnwindSafe(|| {
            m.with_user(MockUser::new(9, "admin"), |_| panic!("boom"))
        }));
        assert!(result.is_err());
        assert!(m.user().is_none());
    }

    #[test]
    fn test_list_runs_every_stage_in_order() {
        let mut m = manager();
        m.list(Options::new()).unwrap();
        assert_eq!(m.trail(), Action::List.stages());
        assert_eq!(m.state(), PipelineState::Committed);
        assert!(m.target().scope().is_some());
    }

    #[test]
    fn test_map_scope_ignores_records() {
        let mut target: Target<MockBackend> = Target::Unset;
        target.map_scope(|q| q);
        assert!(target.is_unset());
    }
}
