//! # Catalog Policies
//!
//! Authorization is role based. The role comes from [`MockUser::role`]; an
//! absent user is a guest.
//!
//! | Action | Product | Order | LineItem |
//! |--------|---------|-------|----------|
//! | list | anyone (customers and guests see active products only) | staff; customers see their own | staff |
//! | read | anyone | staff; customers their own | staff |
//! | new, create | staff | customers for themselves, staff | customers, staff |
//! | edit, update | staff | staff; customers their own open orders | staff |
//! | delete | admin | admin | admin |

use resource_manager::action::Action;
use resource_manager::adapters::{Policy, Subject};
use resource_manager::backend::{Condition, Predicate};
use resource_manager::mock::{MockBackend, MockQuery, MockRecord, MockUser};
use resource_manager::AttrValue;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Guest,
    Customer,
    Staff,
    Admin,
}

impl Role {
    pub fn of(user: Option<&MockUser>) -> Self {
        match user.map(|u| u.role.as_str()) {
            Some("admin") => Role::Admin,
            Some("staff") => Role::Staff,
            Some("customer") => Role::Customer,
            _ => Role::Guest,
        }
    }

    fn is_staff(self) -> bool {
        self >= Role::Staff
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Guest => "guests",
            Role::Customer => "customers",
            Role::Staff => "staff",
            Role::Admin => "admins",
        };
        f.write_str(name)
    }
}

fn denial(user: Option<&MockUser>, action: Action) -> String {
    format!("{} may not {action} here", Role::of(user))
}

fn owned_by(record: &MockRecord, user: &MockUser) -> bool {
    record
        .get("customer_id")
        .is_some_and(|c| c.matches(&AttrValue::from(user.id)))
}

/// Products are public to read; only staff write them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProductPolicy;

impl Policy<MockBackend> for ProductPolicy {
    fn permits(
        &self,
        user: Option<&MockUser>,
        action: Action,
        _subject: &Subject<'_, MockBackend>,
    ) -> bool {
        let role = Role::of(user);
        match action {
            Action::List | Action::Read => true,
            Action::Delete => role == Role::Admin,
            _ => role.is_staff(),
        }
    }

    fn scope(&self, user: Option<&MockUser>, mut query: MockQuery) -> MockQuery {
        if !Role::of(user).is_staff() {
            query
                .conditions
                .push(Condition::new("active", Predicate::NotEq, false));
        }
        query
    }

    fn denial_reason(&self, user: Option<&MockUser>, action: Action) -> String {
        denial(user, action)
    }
}

/// Customers work with their own orders; staff with all of them.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderPolicy;

impl Policy<MockBackend> for OrderPolicy {
    fn permits(
        &self,
        user: Option<&MockUser>,
        action: Action,
        subject: &Subject<'_, MockBackend>,
    ) -> bool {
        match Role::of(user) {
            Role::Admin => true,
            Role::Staff => action != Action::Delete,
            Role::Guest => false,
            Role::Customer => {
                let Some(user) = user else {
                    return false;
                };
                match (action, subject) {
                    (Action::List, Subject::Type(_)) => true,
                    (Action::Delete, _) => false,
                    (Action::Update | Action::Edit, Subject::Record(_, order)) => {
                        owned_by(order, user)
                            && order
                                .get("status")
                                .and_then(AttrValue::as_text)
                                .is_some_and(|s| s == "open")
                    }
                    (_, Subject::Record(_, order)) => owned_by(order, user),
                    (_, Subject::Type(_)) => false,
                }
            }
        }
    }

    fn scope(&self, user: Option<&MockUser>, mut query: MockQuery) -> MockQuery {
        match user {
            Some(u) if !Role::of(user).is_staff() => {
                query
                    .conditions
                    .push(Condition::new("customer_id", Predicate::Eq, u.id));
            }
            _ => {}
        }
        query
    }

    fn denial_reason(&self, user: Option<&MockUser>, action: Action) -> String {
        denial(user, action)
    }
}

/// Line items are written by customers placing orders and otherwise handled by staff.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineItemPolicy;

impl Policy<MockBackend> for LineItemPolicy {
    fn permits(
        &self,
        user: Option<&MockUser>,
        action: Action,
        _subject: &Subject<'_, MockBackend>,
    ) -> bool {
        let role = Role::of(user);
        match action {
            Action::New | Action::Create => role >= Role::Customer,
            Action::Delete => role == Role::Admin,
            _ => role.is_staff(),
        }
    }

    fn denial_reason(&self, user: Option<&MockUser>, action: Action) -> String {
        denial(user, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_manager::backend::{Backend, EntityType};
    use resource_manager::mock::MockSchema;
    use resource_manager::AttributeTree;

    fn order(customer_id: u64, status: &str) -> MockRecord {
        MockBackend::new(MockSchema::new()).new_unsaved(
            &EntityType::new("Order"),
            &AttributeTree::new()
                .with("customer_id", customer_id)
                .with("status", status),
        )
    }

    #[test]
    fn test_roles_parse_with_guest_fallback() {
        assert_eq!(Role::of(None), Role::Guest);
        assert_eq!(Role::of(Some(&MockUser::new(1, "admin"))), Role::Admin);
        assert_eq!(Role::of(Some(&MockUser::new(1, "auditor"))), Role::Guest);
    }

    #[test]
    fn test_customers_touch_only_their_open_orders() {
        let alice = MockUser::new(7, "customer");
        let entity = EntityType::new("Order");
        let own_open = order(7, "open");
        let own_paid = order(7, "paid");
        let foreign = order(8, "open");

        let permits = |action, record| {
            OrderPolicy.permits(Some(&alice), action, &Subject::Record(&entity, record))
        };
        assert!(permits(Action::Read, &own_paid));
        assert!(permits(Action::Update, &own_open));
        assert!(!permits(Action::Update, &own_paid));
        assert!(!permits(Action::Read, &foreign));
        assert!(!permits(Action::Delete, &own_open));
    }

    #[test]
    fn test_customer_order_scope_filters_by_owner() {
        let alice = MockUser::new(7, "customer");
        let backend = MockBackend::new(MockSchema::new());
        let base = backend.scope(&EntityType::new("Order"));

        let scoped = OrderPolicy.scope(Some(&alice), base.clone());
        assert_eq!(
            scoped.conditions,
            vec![Condition::new("customer_id", Predicate::Eq, 7u64)]
        );

        let staff = MockUser::new(1, "staff");
        assert_eq!(OrderPolicy.scope(Some(&staff), base.clone()), base);
    }

    #[test]
    fn test_denial_reason_names_the_role() {
        assert_eq!(
            ProductPolicy.denial_reason(None, Action::Create),
            "guests may not create here"
        );
    }
}
