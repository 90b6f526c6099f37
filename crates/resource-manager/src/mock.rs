//! # In-memory Backend & Testing Guide
//!
//! [`MockBackend`] implements the same [`Backend`] contract a production
//! persistence layer does, but keeps every table in memory. It is meant for
//! fast, deterministic tests of manager types and for demos; nothing here
//! talks to a database.
//!
//! ## What it supports
//!
//! | Feature | How |
//! |---------|-----|
//! | **Schema** | [`MockSchema`] declares attributes (with semantic types) and associations |
//! | **Queries** | conditions, ordering, offset/limit, projection, distinct, named scopes |
//! | **Validation** | per-entity validators returning error messages |
//! | **Destroy rules** | per-entity guards that can refuse a destroy |
//! | **Transactions** | snapshot on begin, restore on rollback (nesting allowed) |
//! | **Assertions** | a journal of every backend call ([`Call`]) |
//!
//! ## Example
//!
//! ```rust
//! use resource_manager::backend::{Backend, EntityType, SemanticType};
//! use resource_manager::mock::{MockBackend, MockSchema};
//! use resource_manager::AttributeTree;
//!
//! let schema = MockSchema::new().entity("Product", |e| {
//!     e.attribute("name", SemanticType::String)
//!         .attribute("price", SemanticType::Decimal)
//! });
//! let backend = MockBackend::new(schema).with_validator("Product", |record| {
//!     if record.get("name").map_or(true, |v| v.is_blank()) {
//!         vec!["name can't be blank".to_string()]
//!     } else {
//!         Vec::new()
//!     }
//! });
//!
//! let product = EntityType::new("Product");
//! let id = backend.insert(&product, AttributeTree::new().with("name", "Widget"));
//! let found = backend.find_by_id(&backend.scope(&product), &id).unwrap();
//! assert_eq!(found.id, Some(id));
//! ```

use crate::attributes::{AttrValue, AttributeTree};
use crate::backend::{Backend, Condition, EntityType, Schema, SemanticType};
use crate::config::EagerLoading;
use crate::error::ManagerError;
use crate::options::{Direction, OrderTerm};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

// =============================================================================
// SCHEMA
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    HasMany,
    HasOne,
    BelongsTo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub kind: AssociationKind,
    pub target: String,
}

/// Schema of one entity type.
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    attributes: BTreeMap<String, SemanticType>,
    associations: BTreeMap<String, Association>,
}

impl EntitySchema {
    pub fn attribute(mut self, name: &str, kind: SemanticType) -> Self {
        self.attributes.insert(name.to_string(), kind);
        self
    }

    pub fn has_many(self, name: &str, target: &str) -> Self {
        self.association(name, AssociationKind::HasMany, target)
    }

    pub fn has_one(self, name: &str, target: &str) -> Self {
        self.association(name, AssociationKind::HasOne, target)
    }

    pub fn belongs_to(self, name: &str, target: &str) -> Self {
        self.association(name, AssociationKind::BelongsTo, target)
    }

    fn association(mut self, name: &str, kind: AssociationKind, target: &str) -> Self {
        self.associations.insert(
            name.to_string(),
            Association {
                kind,
                target: target.to_string(),
            },
        );
        self
    }
}

/// Declarative schema for [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockSchema {
    entities: BTreeMap<String, EntitySchema>,
}

impl MockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or extends) an entity type.
    pub fn entity(mut self, name: &str, build: impl FnOnce(EntitySchema) -> EntitySchema) -> Self {
        let existing = self.entities.remove(name).unwrap_or_default();
        self.entities.insert(name.to_string(), build(existing));
        self
    }

    pub fn association(&self, entity: &EntityType, name: &str) -> Option<&Association> {
        self.entities.get(entity.name())?.associations.get(name)
    }
}

impl Schema for MockSchema {
    fn entity_type(&self, name: &str) -> Option<EntityType> {
        self.entities.contains_key(name).then(|| EntityType::new(name))
    }

    fn association_target_type(&self, entity: &EntityType, name: &str) -> Option<EntityType> {
        self.association(entity, name)
            .map(|a| EntityType::new(&a.target))
    }

    fn attribute_semantic_type(&self, entity: &EntityType, name: &str) -> Option<SemanticType> {
        self.entities.get(entity.name())?.attributes.get(name).copied()
    }
}

// =============================================================================
// RECORDS, QUERIES, USERS
// =============================================================================

/// A row, saved or not.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRecord {
    pub entity: EntityType,
    /// `None` until the first successful save.
    pub id: Option<u64>,
    pub attributes: AttributeTree,
    /// Messages from the last failed save or destroy.
    pub errors: Vec<String>,
    /// Associations eager-loaded with the record.
    pub loaded: Vec<String>,
}

impl MockRecord {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn field(&self, name: &str) -> Option<AttrValue> {
        if name == "id" {
            return self.id.map(AttrValue::from);
        }
        self.attributes.get(name).cloned()
    }
}

/// A lazily evaluated query. Nothing is read until [`MockBackend::load`] or
/// [`Backend::find_by_id`] runs it.
#[derive(Debug, Clone, PartialEq)]
pub struct MockQuery {
    pub entity: EntityType,
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderTerm>,
    /// Named scopes applied, in order.
    pub scopes: Vec<String>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub eager: Vec<String>,
    pub eager_strategy: Option<EagerLoading>,
    pub select: Vec<String>,
    pub distinct: bool,
}

impl MockQuery {
    fn new(entity: &EntityType) -> Self {
        Self {
            entity: entity.clone(),
            conditions: Vec::new(),
            order: Vec::new(),
            scopes: Vec::new(),
            limit: None,
            offset: 0,
            eager: Vec::new(),
            eager_strategy: None,
            select: Vec::new(),
            distinct: false,
        }
    }

    fn admits(&self, record: &MockRecord) -> bool {
        self.conditions
            .iter()
            .all(|c| c.test(record.field(&c.field).as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockUser {
    pub id: u64,
    pub role: String,
}

impl MockUser {
    pub fn new(id: u64, role: &str) -> Self {
        Self {
            id,
            role: role.to_string(),
        }
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// One entry of the call journal.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find { entity: EntityType, id: u64 },
    Load { entity: EntityType },
    Save { entity: EntityType, id: Option<u64>, ok: bool },
    Destroy { entity: EntityType, id: Option<u64>, ok: bool },
    Begin,
    Commit,
    Rollback,
}

type Validator = Box<dyn Fn(&MockRecord) -> Vec<String> + Send + Sync>;
type DestroyGuard = Box<dyn Fn(&MockRecord) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<EntityType, BTreeMap<u64, AttributeTree>>,
    next_id: u64,
}

#[derive(Default)]
struct Store {
    tables: Tables,
    journal: Vec<Call>,
}

/// In-memory implementation of [`Backend`].
pub struct MockBackend {
    schema: MockSchema,
    validators: BTreeMap<String, Vec<Validator>>,
    destroy_guards: BTreeMap<String, Vec<DestroyGuard>>,
    named_scopes: BTreeMap<(String, String), Vec<Condition>>,
    store: Mutex<Store>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("schema", &self.schema)
            .field("tables", &self.lock().tables)
            .finish_non_exhaustive()
    }
}

impl MockBackend {
    pub fn new(schema: MockSchema) -> Self {
        Self {
            schema,
            validators: BTreeMap::new(),
            destroy_guards: BTreeMap::new(),
            named_scopes: BTreeMap::new(),
            store: Mutex::new(Store::default()),
        }
    }

    /// Adds a validator; its messages make `save` fail.
    pub fn with_validator<F>(mut self, entity: &str, validator: F) -> Self
    where
        F: Fn(&MockRecord) -> Vec<String> + Send + Sync + 'static,
    {
        self.validators
            .entry(entity.to_string())
            .or_default()
            .push(Box::new(validator));
        self
    }

    /// Adds a destroy guard; `Some(reason)` refuses the destroy.
    pub fn with_destroy_guard<F>(mut self, entity: &str, guard: F) -> Self
    where
        F: Fn(&MockRecord) -> Option<String> + Send + Sync + 'static,
    {
        self.destroy_guards
            .entry(entity.to_string())
            .or_default()
            .push(Box::new(guard));
        self
    }

    /// Declares a named scope as a fixed set of conditions.
    pub fn with_named_scope(
        mut self,
        entity: &str,
        name: &str,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.named_scopes.insert(
            (entity.to_string(), name.to_string()),
            conditions.into_iter().collect(),
        );
        self
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a row directly, bypassing validation. Returns its id.
    pub fn insert(&self, entity: &EntityType, attributes: AttributeTree) -> u64 {
        let mut store = self.lock();
        store.tables.next_id += 1;
        let id = store.tables.next_id;
        store
            .tables
            .rows
            .entry(entity.clone())
            .or_default()
            .insert(id, attributes);
        id
    }

    /// Stored attributes of a row.
    pub fn get(&self, entity: &EntityType, id: u64) -> Option<AttributeTree> {
        self.lock().tables.rows.get(entity)?.get(&id).cloned()
    }

    pub fn count(&self, entity: &EntityType) -> usize {
        self.lock().tables.rows.get(entity).map_or(0, BTreeMap::len)
    }

    /// Runs `query` and returns the matching records.
    pub fn load(&self, query: &MockQuery) -> Vec<MockRecord> {
        let mut store = self.lock();
        store.journal.push(Call::Load {
            entity: query.entity.clone(),
        });
        let mut records: Vec<MockRecord> = store
            .tables
            .rows
            .get(&query.entity)
            .into_iter()
            .flatten()
            .map(|(id, attrs)| Self::materialize(query, *id, attrs))
            .filter(|r| query.admits(r))
            .collect();
        drop(store);

        records.sort_by(|a, b| compare_records(&query.order, a, b));
        let mut records: Vec<MockRecord> = records
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(query.limit.map_or(usize::MAX, |l| {
                usize::try_from(l).unwrap_or(usize::MAX)
            }))
            .map(|r| Self::project(query, r))
            .collect();
        if query.distinct {
            let mut seen: Vec<AttributeTree> = Vec::new();
            records.retain(|r| {
                if seen.contains(&r.attributes) {
                    false
                } else {
                    seen.push(r.attributes.clone());
                    true
                }
            });
        }
        records
    }

    /// Every call made so far.
    pub fn journal(&self) -> Vec<Call> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    fn materialize(query: &MockQuery, id: u64, attributes: &AttributeTree) -> MockRecord {
        MockRecord {
            entity: query.entity.clone(),
            id: Some(id),
            attributes: attributes.clone(),
            errors: Vec::new(),
            loaded: query.eager.clone(),
        }
    }

    fn project(query: &MockQuery, mut record: MockRecord) -> MockRecord {
        if !query.select.is_empty() {
            record.attributes = record.attributes.project(&query.select);
        }
        record
    }

    fn validate(&self, record: &MockRecord) -> Vec<String> {
        self.validators
            .get(record.entity.name())
            .into_iter()
            .flatten()
            .flat_map(|v| v(record))
            .collect()
    }

    fn refusal(&self, record: &MockRecord) -> Option<String> {
        self.destroy_guards
            .get(record.entity.name())
            .into_iter()
            .flatten()
            .find_map(|g| g(record))
    }
}

fn compare_records(terms: &[OrderTerm], a: &MockRecord, b: &MockRecord) -> Ordering {
    for term in terms {
        let ordering = match (a.field(&term.column), b.field(&term.column)) {
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match term.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

impl Backend for MockBackend {
    type Id = u64;
    type Record = MockRecord;
    type Query = MockQuery;
    type User = MockUser;

    fn schema(&self) -> &dyn Schema {
        &self.schema
    }

    fn scope(&self, entity: &EntityType) -> MockQuery {
        MockQuery::new(entity)
    }

    fn filter(&self, mut query: MockQuery, condition: &Condition) -> MockQuery {
        query.conditions.push(condition.clone());
        query
    }

    fn order(&self, mut query: MockQuery, terms: &[OrderTerm]) -> MockQuery {
        query.order.extend_from_slice(terms);
        query
    }

    fn named_scope(&self, mut query: MockQuery, name: &str) -> Result<MockQuery, ManagerError> {
        let key = (query.entity.name().to_string(), name.to_string());
        let conditions = self
            .named_scopes
            .get(&key)
            .ok_or_else(|| ManagerError::UnknownScope {
                entity: query.entity.to_string(),
                scope: name.to_string(),
            })?;
        query.conditions.extend(conditions.iter().cloned());
        query.scopes.push(name.to_string());
        Ok(query)
    }

    fn limit_offset(&self, mut query: MockQuery, limit: u64, offset: u64) -> MockQuery {
        query.limit = Some(limit);
        query.offset = offset;
        query
    }

    fn eager_load(
        &self,
        mut query: MockQuery,
        associations: &[String],
        strategy: EagerLoading,
    ) -> MockQuery {
        query.eager.extend(associations.iter().cloned());
        query.eager_strategy = Some(strategy);
        query
    }

    fn select(&self, mut query: MockQuery, columns: &[String]) -> MockQuery {
        query.select.extend(columns.iter().cloned());
        query
    }

    fn distinct(&self, mut query: MockQuery) -> MockQuery {
        query.distinct = true;
        query
    }

    fn new_unsaved(&self, entity: &EntityType, attributes: &AttributeTree) -> MockRecord {
        MockRecord {
            entity: entity.clone(),
            id: None,
            attributes: attributes.clone(),
            errors: Vec::new(),
            loaded: Vec::new(),
        }
    }

    fn assign(&self, record: &mut MockRecord, attributes: &AttributeTree) {
        record.attributes = record.attributes.merged(attributes);
    }

    fn find_by_id(&self, query: &MockQuery, id: &u64) -> Result<MockRecord, ManagerError> {
        let mut store = self.lock();
        store.journal.push(Call::Find {
            entity: query.entity.clone(),
            id: *id,
        });
        let found = store
            .tables
            .rows
            .get(&query.entity)
            .and_then(|rows| rows.get(id))
            .map(|attrs| Self::materialize(query, *id, attrs))
            .filter(|r| query.admits(r));
        trace!(entity = %query.entity, id, found = found.is_some(), "Lookup");
        found
            .map(|r| Self::project(query, r))
            .ok_or_else(|| ManagerError::RecordNotFound {
                entity: query.entity.to_string(),
                id: id.to_string(),
            })
    }

    fn record_errors(&self, record: &MockRecord) -> Vec<String> {
        record.errors.clone()
    }

    fn save(&self, record: &mut MockRecord) -> bool {
        record.errors = self.validate(record);
        let ok = record.errors.is_empty();
        let mut store = self.lock();
        if ok {
            let id = match record.id {
                Some(id) => id,
                None => {
                    store.tables.next_id += 1;
                    store.tables.next_id
                }
            };
            store
                .tables
                .rows
                .entry(record.entity.clone())
                .or_default()
                .insert(id, record.attributes.clone());
            record.id = Some(id);
        }
        store.journal.push(Call::Save {
            entity: record.entity.clone(),
            id: record.id,
            ok,
        });
        debug!(entity = %record.entity, id = ?record.id, ok, "Save");
        ok
    }

    fn save_or_fail(&self, record: &mut MockRecord) -> Result<(), ManagerError> {
        if self.save(record) {
            Ok(())
        } else {
            Err(ManagerError::ValidationFailed {
                entity: record.entity.to_string(),
                errors: record.errors.clone(),
            })
        }
    }

    fn destroy(&self, record: &mut MockRecord) -> bool {
        record.errors.clear();
        if let Some(reason) = self.refusal(record) {
            record.errors.push(reason);
        }
        let mut store = self.lock();
        let removed = record.errors.is_empty()
            && record
                .id
                .and_then(|id| store.tables.rows.get_mut(&record.entity)?.remove(&id))
                .is_some();
        if !removed && record.errors.is_empty() {
            record.errors.push("record is not persisted".to_string());
        }
        store.journal.push(Call::Destroy {
            entity: record.entity.clone(),
            id: record.id,
            ok: removed,
        });
        debug!(entity = %record.entity, id = ?record.id, ok = removed, "Destroy");
        removed
    }

    fn destroy_or_fail(&self, record: &mut MockRecord) -> Result<(), ManagerError> {
        if self.destroy(record) {
            Ok(())
        } else {
            Err(ManagerError::PersistenceFailed {
                entity: record.entity.to_string(),
                reason: record.errors.join(", "),
            })
        }
    }

    fn run_atomically(
        &self,
        unit: &mut dyn FnMut() -> Result<(), ManagerError>,
    ) -> Result<(), ManagerError> {
        let snapshot = {
            let mut store = self.lock();
            store.journal.push(Call::Begin);
            store.tables.clone()
        };
        let result = unit();
        let mut store = self.lock();
        match &result {
            Ok(()) => store.journal.push(Call::Commit),
            Err(e) => {
                debug!(error = %e, "Rolling back");
                store.tables = snapshot;
                store.journal.push(Call::Rollback);
            }
        }
        result
    }
}
