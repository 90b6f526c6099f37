//! Authorization adapters.
//!
//! Record-level actions authorize the concrete record. `list` authorizes the
//! entity type once and restricts rows through [`Authorizer::scoped_query`].

use crate::action::Action;
use crate::backend::{Backend, EntityType};
use crate::error::ManagerError;
use std::sync::Arc;

/// What is being authorized.
pub enum Subject<'a, B: Backend> {
    /// The entity type as a whole (used by `list`).
    Type(&'a EntityType),
    Record(&'a EntityType, &'a B::Record),
}

impl<B: Backend> Subject<'_, B> {
    pub fn entity(&self) -> &EntityType {
        match self {
            Subject::Type(entity) | Subject::Record(entity, _) => entity,
        }
    }
}

/// The authorization collaborator.
pub trait Authorizer<B: Backend>: Send + Sync {
    /// Fails with [`ManagerError::AuthorizationDenied`] when `user` may not
    /// perform `action` on `subject`.
    fn authorize(
        &self,
        user: Option<&B::User>,
        action: Action,
        subject: &Subject<'_, B>,
    ) -> Result<(), ManagerError>;

    /// `base` restricted to the rows `user` may see.
    fn scoped_query(&self, user: Option<&B::User>, entity: &EntityType, base: B::Query) -> B::Query;
}

/// `none`: every action is permitted and every row visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl<B: Backend> Authorizer<B> for AllowAll {
    fn authorize(
        &self,
        _user: Option<&B::User>,
        _action: Action,
        _subject: &Subject<'_, B>,
    ) -> Result<(), ManagerError> {
        Ok(())
    }

    fn scoped_query(
        &self,
        _user: Option<&B::User>,
        _entity: &EntityType,
        base: B::Query,
    ) -> B::Query {
        base
    }
}

/// Per-entity authorization rules used by [`PolicyAuthorizer`].
pub trait Policy<B: Backend>: Send + Sync {
    fn permits(&self, user: Option<&B::User>, action: Action, subject: &Subject<'_, B>) -> bool;

    /// Row restriction for `list`. Defaults to no restriction.
    fn scope(&self, _user: Option<&B::User>, query: B::Query) -> B::Query {
        query
    }

    /// Explanation attached to a denial.
    fn denial_reason(&self, _user: Option<&B::User>, action: Action) -> String {
        format!("policy forbids {action}")
    }
}

/// `policy`: delegates every decision to one [`Policy`].
pub struct PolicyAuthorizer<B: Backend> {
    policy: Arc<dyn Policy<B>>,
}

impl<B: Backend> PolicyAuthorizer<B> {
    pub fn new(policy: Arc<dyn Policy<B>>) -> Self {
        Self { policy }
    }
}

impl<B: Backend> Authorizer<B> for PolicyAuthorizer<B> {
    fn authorize(
        &self,
        user: Option<&B::User>,
        action: Action,
        subject: &Subject<'_, B>,
    ) -> Result<(), ManagerError> {
        if self.policy.permits(user, action, subject) {
            Ok(())
        } else {
            Err(ManagerError::AuthorizationDenied {
                action,
                entity: subject.entity().to_string(),
                reason: self.policy.denial_reason(user, action),
            })
        }
    }

    fn scoped_query(
        &self,
        user: Option<&B::User>,
        _entity: &EntityType,
        base: B::Query,
    ) -> B::Query {
        self.policy.scope(user, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockUser};

    struct ReadOnly;

    impl Policy<MockBackend> for ReadOnly {
        fn permits(
            &self,
            user: Option<&MockUser>,
            action: Action,
            _: &Subject<'_, MockBackend>,
        ) -> bool {
            user.is_some() && matches!(action, Action::List | Action::Read)
        }
    }

    #[test]
    fn test_policy_denials_name_the_action_and_entity() {
        let authorizer = PolicyAuthorizer::<MockBackend>::new(Arc::new(ReadOnly));
        let product = EntityType::new("Product");
        let user = MockUser::new(1, "reader");

        assert!(authorizer
            .authorize(Some(&user), Action::List, &Subject::Type(&product))
            .is_ok());

        let err = authorizer
            .authorize(Some(&user), Action::Delete, &Subject::Type(&product))
            .unwrap_err();
        match err {
            ManagerError::AuthorizationDenied { action, entity, reason } => {
                assert_eq!(action, Action::Delete);
                assert_eq!(entity, "Product");
                assert_eq!(reason, "policy forbids delete");
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(authorizer
            .authorize(None, Action::Read, &Subject::Type(&product))
            .is_err());
    }

    #[test]
    fn test_allow_all_keeps_the_base_scope() {
        let backend = MockBackend::new(Default::default());
        let product = EntityType::new("Product");
        let base = backend.scope(&product);
        let scoped =
            Authorizer::<MockBackend>::scoped_query(&AllowAll, None, &product, base.clone());
        assert_eq!(format!("{scoped:?}"), format!("{base:?}"));
    }
}
