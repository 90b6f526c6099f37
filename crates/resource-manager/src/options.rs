//! # Call-site Options
//!
//! [`Options`] carries the per-call knobs of an action, keyed by [`OptionKey`].
//! Values stay as `serde_json::Value` until a stage needs them; the helpers at
//! the bottom of this module turn them into the typed form the backend takes.

use crate::error::ManagerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Enumerated option keys. Defaults may be registered for any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    /// Payload for the search adapter.
    Search,
    /// Column list or expression.
    Order,
    /// Named predefined filters.
    Scopes,
    /// `{number, size}` or a bare page number.
    Page,
    /// Page size.
    PerPage,
    /// Associations to eager-load.
    Includes,
    /// Columns to select.
    Select,
    Distinct,
    /// Attribute defaults merged under the caller's attributes on `new`/`create`.
    Attributes,
}

impl OptionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::Search => "search",
            OptionKey::Order => "order",
            OptionKey::Scopes => "scopes",
            OptionKey::Page => "page",
            OptionKey::PerPage => "per_page",
            OptionKey::Includes => "includes",
            OptionKey::Select => "select",
            OptionKey::Distinct => "distinct",
            OptionKey::Attributes => "attributes",
        }
    }
}

impl Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options passed by the caller of an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<OptionKey, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: OptionKey, value: impl Into<Value>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn get(&self, key: OptionKey) -> Option<&Value> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert(&mut self, key: OptionKey, value: Value) {
        self.values.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn search(self, payload: Value) -> Self {
        self.set(OptionKey::Search, payload)
    }

    pub fn order<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(OptionKey::Order, strings(columns))
    }

    pub fn scopes<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(OptionKey::Scopes, strings(names))
    }

    pub fn page(self, number: u64, size: u64) -> Self {
        self.set(
            OptionKey::Page,
            serde_json::json!({ "number": number, "size": size }),
        )
    }

    pub fn per_page(self, size: u64) -> Self {
        self.set(OptionKey::PerPage, size)
    }

    pub fn includes<I, S>(self, associations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(OptionKey::Includes, strings(associations))
    }

    pub fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(OptionKey::Select, strings(columns))
    }

    pub fn distinct(self, distinct: bool) -> Self {
        self.set(OptionKey::Distinct, distinct)
    }
}

fn strings<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Array(items.into_iter().map(|s| Value::String(s.into())).collect())
}

// =============================================================================
// TYPED VIEWS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn parse(key: OptionKey, text: &str) -> Result<Self, ManagerError> {
        match text.to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(ManagerError::invalid_option(
                key.as_str(),
                format!("unknown direction {other:?}"),
            )),
        }
    }
}

/// One ordering column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderTerm {
    pub column: String,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }

    /// Parses `"column"`, `"column desc"` or `"-column"`.
    pub(crate) fn parse(key: OptionKey, text: &str) -> Result<Option<Self>, ManagerError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if let Some(column) = text.strip_prefix('-') {
            return Ok(Some(Self::desc(column.trim())));
        }
        let mut parts = text.split_whitespace();
        let column = parts.next().unwrap_or_default();
        let direction = Direction::parse(key, parts.next().unwrap_or_default())?;
        if parts.next().is_some() {
            return Err(ManagerError::invalid_option(
                key.as_str(),
                format!("cannot parse {text:?}"),
            ));
        }
        Ok(Some(Self {
            column: column.to_string(),
            direction,
        }))
    }
}

/// Ordering terms from a string expression, a list, or a `{column: direction}` object.
pub fn order_terms(key: OptionKey, value: &Value) -> Result<Vec<OrderTerm>, ManagerError> {
    let mut terms = Vec::new();
    match value {
        Value::Null => {}
        Value::String(expr) => {
            for part in expr.split(',') {
                terms.extend(OrderTerm::parse(key, part)?);
            }
        }
        Value::Array(items) => {
            for item in items {
                terms.extend(order_terms(key, item)?);
            }
        }
        Value::Object(map) => {
            for (column, direction) in map {
                let direction = match direction {
                    Value::String(d) => Direction::parse(key, d)?,
                    _ => {
                        return Err(ManagerError::invalid_option(
                            key.as_str(),
                            format!("direction for {column} must be a string"),
                        ))
                    }
                };
                terms.push(OrderTerm {
                    column: column.clone(),
                    direction,
                });
            }
        }
        other => {
            return Err(ManagerError::invalid_option(
                key.as_str(),
                format!("unsupported value {other}"),
            ))
        }
    }
    Ok(terms)
}

/// A list of names from a comma-separated string or an array of strings.
pub fn string_list(key: OptionKey, value: &Value) -> Result<Vec<String>, ManagerError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(string_list(key, item)?);
            }
            Ok(out)
        }
        other => Err(ManagerError::invalid_option(
            key.as_str(),
            format!("expected a name list, got {other}"),
        )),
    }
}

/// Association paths; nested objects flatten to dotted paths
/// (`{"line_items": ["product"]}` becomes `line_items.product`).
pub fn association_paths(key: OptionKey, value: &Value) -> Result<Vec<String>, ManagerError> {
    match value {
        Value::Object(map) => {
            let mut out = Vec::new();
            for (parent, children) in map {
                let nested = association_paths(key, children)?;
                if nested.is_empty() {
                    out.push(parent.clone());
                }
                out.extend(nested.into_iter().map(|child| format!("{parent}.{child}")));
            }
            Ok(out)
        }
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(association_paths(key, item)?);
            }
            Ok(out)
        }
        other => string_list(key, other),
    }
}

/// Page number and size from `{number, size}` or a bare number.
pub fn page_spec(value: &Value) -> Result<(Option<u64>, Option<u64>), ManagerError> {
    let key = OptionKey::Page.as_str();
    match value {
        Value::Null => Ok((None, None)),
        Value::Object(map) => {
            let number = map.get("number").map(|v| unsigned(key, v)).transpose()?;
            let size = map.get("size").map(|v| unsigned(key, v)).transpose()?;
            Ok((number, size))
        }
        other => Ok((Some(unsigned(key, other)?), None)),
    }
}

/// A non-negative integer, accepting numeric strings.
pub fn unsigned(key: &str, value: &Value) -> Result<u64, ManagerError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ManagerError::invalid_option(key, format!("expected a non-negative integer, got {value}"))
    })
}
