//! Search adapters.
//!
//! The predicate search understands payloads shaped like
//! `{"name_cont": "widget", "price_lteq": "20", "s": "price desc"}`: each key
//! is a field name followed by a predicate suffix, and `s` (or `sorts`) carries
//! sort terms. Blank values are ignored.

use crate::attributes::AttrValue;
use crate::backend::{Backend, Condition, Predicate};
use crate::error::ManagerError;
use crate::options::{order_terms, OptionKey};
use serde_json::Value;
use tracing::debug;

/// The search collaborator.
pub trait Searcher<B: Backend>: Send + Sync {
    /// Returns the filtered scope and whether the payload carried its own sort,
    /// in which case the manager's default ordering is skipped.
    fn apply_search(
        &self,
        backend: &B,
        scope: B::Query,
        search: &Value,
    ) -> Result<(B::Query, bool), ManagerError>;
}

/// `none`: searches are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSearch;

impl<B: Backend> Searcher<B> for NoSearch {
    fn apply_search(
        &self,
        _backend: &B,
        scope: B::Query,
        _search: &Value,
    ) -> Result<(B::Query, bool), ManagerError> {
        Ok((scope, false))
    }
}

/// `predicate`: `<field>_<predicate>` keys plus `s`/`sorts`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PredicateSearch;

// Longer suffixes first so `not_eq` wins over `eq` and `gteq` over `eq`.
const SUFFIXES: &[(&str, Predicate)] = &[
    ("_not_eq", Predicate::NotEq),
    ("_start", Predicate::StartsWith),
    ("_gteq", Predicate::Gteq),
    ("_lteq", Predicate::Lteq),
    ("_cont", Predicate::Contains),
    ("_null", Predicate::Null),
    ("_end", Predicate::EndsWith),
    ("_eq", Predicate::Eq),
    ("_gt", Predicate::Gt),
    ("_lt", Predicate::Lt),
    ("_in", Predicate::In),
];

const SORT_KEYS: &[&str] = &["s", "sorts"];

impl PredicateSearch {
    /// Splits `price_gteq` into (`price`, `Gteq`).
    pub fn parse_key(key: &str) -> Option<(&str, Predicate)> {
        SUFFIXES.iter().find_map(|(suffix, predicate)| {
            key.strip_suffix(suffix)
                .filter(|field| !field.is_empty())
                .map(|field| (field, *predicate))
        })
    }

    fn is_blank(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl<B: Backend> Searcher<B> for PredicateSearch {
    fn apply_search(
        &self,
        backend: &B,
        mut scope: B::Query,
        search: &Value,
    ) -> Result<(B::Query, bool), ManagerError> {
        let Value::Object(map) = search else {
            if Self::is_blank(search) {
                return Ok((scope, false));
            }
            return Err(ManagerError::invalid_option(
                OptionKey::Search.as_str(),
                "expected an object",
            ));
        };

        let mut sorted = false;
        for (key, value) in map {
            if Self::is_blank(value) {
                continue;
            }
            if SORT_KEYS.contains(&key.as_str()) {
                let terms = order_terms(OptionKey::Search, value)?;
                if !terms.is_empty() {
                    scope = backend.order(scope, &terms);
                    sorted = true;
                }
                continue;
            }
            let Some((field, predicate)) = Self::parse_key(key) else {
                return Err(ManagerError::invalid_option(
                    OptionKey::Search.as_str(),
                    format!("unknown search key {key:?}"),
                ));
            };
            let condition = Condition::new(field, predicate, AttrValue::from(value.clone()));
            debug!(field, ?predicate, "Search condition");
            scope = backend.filter(scope, &condition);
        }
        Ok((scope, sorted))
    }
}
