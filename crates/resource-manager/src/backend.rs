//! # Backend Contract
//!
//! The persistence/query backend is an external collaborator. This module
//! defines what the pipeline needs from it: a queryable type [`Schema`], query
//! composition, record construction and lookup, raising and non-raising writes,
//! and an atomic unit.
//!
//! All calls are synchronous and blocking. Implementations own whatever
//! interior mutability they need; the pipeline only ever holds `&B`.

use crate::attributes::{AttrValue, AttributeTree};
use crate::config::EagerLoading;
use crate::error::ManagerError;
use crate::options::OrderTerm;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

/// Name of an entity type known to the backend (e.g. `Product`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Semantic tag for an attribute, as reported by the backend schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Text,
    Integer,
    Decimal,
    Float,
    Boolean,
    Date,
    DateTime,
    Json,
}

/// Type metadata keyed by entity type and field name.
pub trait Schema: Send + Sync {
    /// Resolves a bare entity name to a known entity type.
    fn entity_type(&self, name: &str) -> Option<EntityType>;

    /// Target entity type of an association, if `name` is one.
    fn association_target_type(&self, entity: &EntityType, name: &str) -> Option<EntityType>;

    /// Semantic type of an attribute, if `name` is one.
    fn attribute_semantic_type(&self, entity: &EntityType, name: &str) -> Option<SemanticType>;
}

/// Comparison operator of a structured filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq,
    NotEq,
    /// Case-insensitive substring.
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gteq,
    Lt,
    Lteq,
    /// Value is a list; matches any member.
    In,
    /// Value is a bool; `true` matches null/missing.
    Null,
}

/// A single structured filter on an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
    pub value: AttrValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        predicate: Predicate,
        value: impl Into<AttrValue>,
    ) -> Self {
        Self {
            field: field.into(),
            predicate,
            value: value.into(),
        }
    }

    /// Evaluates the condition against a candidate value (`None` when the
    /// attribute is absent).
    pub fn test(&self, candidate: Option<&AttrValue>) -> bool {
        use std::cmp::Ordering::*;
        let candidate = candidate.unwrap_or(&AttrValue::Null);
        match self.predicate {
            Predicate::Eq => candidate.matches(&self.value),
            Predicate::NotEq => !candidate.matches(&self.value),
            Predicate::Contains | Predicate::StartsWith | Predicate::EndsWith => {
                let (Some(hay), Some(needle)) = (candidate.as_text(), self.value.as_text()) else {
                    return false;
                };
                let hay = hay.to_lowercase();
                let needle = needle.to_lowercase();
                match self.predicate {
                    Predicate::Contains => hay.contains(&needle),
                    Predicate::StartsWith => hay.starts_with(&needle),
                    _ => hay.ends_with(&needle),
                }
            }
            Predicate::Gt => candidate.compare(&self.value) == Some(Greater),
            Predicate::Gteq => matches!(candidate.compare(&self.value), Some(Greater | Equal)),
            Predicate::Lt => candidate.compare(&self.value) == Some(Less),
            Predicate::Lteq => matches!(candidate.compare(&self.value), Some(Less | Equal)),
            Predicate::In => match &self.value {
                AttrValue::List(items) => items.iter().any(|v| candidate.matches(v)),
                single => candidate.matches(single),
            },
            Predicate::Null => {
                let wants_null = !matches!(self.value, AttrValue::Bool(false));
                wants_null == matches!(candidate, AttrValue::Null)
            }
        }
    }
}

/// The persistence/query collaborator.
pub trait Backend: Send + Sync + 'static {
    type Id: Clone + Debug + Display + Send + Sync;
    type Record: Clone + Debug + Send + Sync;
    type Query: Clone + Debug + Send + Sync;
    type User: Clone + Debug + Send + Sync;

    fn schema(&self) -> &dyn Schema;

    // --- Query composition ---

    /// Unrestricted query over every row of `entity`.
    fn scope(&self, entity: &EntityType) -> Self::Query;

    fn filter(&self, query: Self::Query, condition: &Condition) -> Self::Query;

    /// Appends ordering terms after any already present.
    fn order(&self, query: Self::Query, terms: &[OrderTerm]) -> Self::Query;

    /// Applies a predefined filter; unknown names are [`ManagerError::UnknownScope`].
    fn named_scope(&self, query: Self::Query, name: &str) -> Result<Self::Query, ManagerError>;

    fn limit_offset(&self, query: Self::Query, limit: u64, offset: u64) -> Self::Query;

    fn eager_load(
        &self,
        query: Self::Query,
        associations: &[String],
        strategy: EagerLoading,
    ) -> Self::Query;

    fn select(&self, query: Self::Query, columns: &[String]) -> Self::Query;

    fn distinct(&self, query: Self::Query) -> Self::Query;

    // --- Records ---

    fn new_unsaved(&self, entity: &EntityType, attributes: &AttributeTree) -> Self::Record;

    fn assign(&self, record: &mut Self::Record, attributes: &AttributeTree);

    /// Looks `id` up within `query`; absent rows are [`ManagerError::RecordNotFound`].
    fn find_by_id(&self, query: &Self::Query, id: &Self::Id) -> Result<Self::Record, ManagerError>;

    /// Errors accumulated on the record by the last failed write.
    fn record_errors(&self, record: &Self::Record) -> Vec<String>;

    // --- Writes ---

    /// Non-raising save.
    fn save(&self, record: &mut Self::Record) -> bool;

    /// Raising save; fails with [`ManagerError::ValidationFailed`].
    fn save_or_fail(&self, record: &mut Self::Record) -> Result<(), ManagerError>;

    /// Non-raising destroy.
    fn destroy(&self, record: &mut Self::Record) -> bool;

    /// Raising destroy; fails with [`ManagerError::PersistenceFailed`].
    fn destroy_or_fail(&self, record: &mut Self::Record) -> Result<(), ManagerError>;

    /// Runs `unit` in one transaction: commit on `Ok`, full rollback on `Err`.
    /// The unit's error is returned unchanged.
    fn run_atomically(
        &self,
        unit: &mut dyn FnMut() -> Result<(), ManagerError>,
    ) -> Result<(), ManagerError>;
}
