//! # Configuration Registry
//!
//! Process-wide choice of collaborator adapters, the default eager-loading
//! strategy, the suffix stripped from manager type names when inferring the
//! entity type, and the decimal separator of the active locale.
//!
//! Every setter validates against its enumerated option set and fails with a
//! [`ConfigError`] on anything else, blank input included. Validation happens
//! here, once, at setup: a manager type copies the current configuration when
//! it is built and never consults the registry again.
//!
//! ```rust
//! use resource_manager::config::{self, AuthorizationChoice};
//!
//! config::set_authorization_adapter("policy").unwrap();
//! assert_eq!(config::current().authorization, AuthorizationChoice::Policy);
//! assert!(config::set_authorization_adapter("cancan").is_err());
//! config::reset();
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::{LazyLock, PoisonError, RwLock};
use tracing::info;

fn parse_choice<T: Copy>(
    setting: &'static str,
    value: &str,
    table: &[(&str, T)],
) -> Result<T, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Blank { setting });
    }
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, choice)| *choice)
        .ok_or_else(|| ConfigError::UnknownChoice {
            setting,
            value: value.to_string(),
        })
}

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $setting:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            const TABLE: &'static [(&'static str, $name)] = &[$(($text, $name::$variant)),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_choice($setting, s, Self::TABLE)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(
    /// Which authorization adapter manager types get.
    AuthorizationChoice, "authorization adapter", {
        None => "none",
        Policy => "policy",
        Custom => "custom",
    }
);

choice_enum!(
    /// Which search adapter manager types get.
    SearchChoice, "search adapter", {
        None => "none",
        Predicate => "predicate",
        Custom => "custom",
    }
);

choice_enum!(
    /// Which pagination adapter manager types get.
    PaginationChoice, "pagination adapter", {
        None => "none",
        Offset => "offset",
        Custom => "custom",
    }
);

choice_enum!(
    /// How associations named in `includes` are loaded.
    EagerLoading, "eager loading strategy", {
        Includes => "includes",
        Preload => "preload",
        EagerLoad => "eager_load",
    }
);

choice_enum!(
    /// Decimal separator of the active locale's numeric convention.
    DecimalSeparator, "decimal separator", {
        Point => "point",
        Comma => "comma",
    }
);

impl DecimalSeparator {
    pub fn as_char(self) -> char {
        match self {
            DecimalSeparator::Point => '.',
            DecimalSeparator::Comma => ',',
        }
    }
}

pub const DEFAULT_TYPE_SUFFIX: &str = "Manager";

/// A validated configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct ManagerConfig {
    pub authorization: AuthorizationChoice,
    pub search: SearchChoice,
    pub pagination: PaginationChoice,
    pub eager_loading: EagerLoading,
    pub type_suffix: String,
    pub decimal_separator: DecimalSeparator,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            authorization: AuthorizationChoice::None,
            search: SearchChoice::None,
            pagination: PaginationChoice::None,
            eager_loading: EagerLoading::Includes,
            type_suffix: DEFAULT_TYPE_SUFFIX.to_string(),
            decimal_separator: DecimalSeparator::Point,
        }
    }
}

impl ManagerConfig {
    /// Parses a JSON document; absent keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn set_authorization_adapter(&mut self, value: &str) -> Result<(), ConfigError> {
        self.authorization = value.parse()?;
        Ok(())
    }

    pub fn set_search_adapter(&mut self, value: &str) -> Result<(), ConfigError> {
        self.search = value.parse()?;
        Ok(())
    }

    pub fn set_pagination_adapter(&mut self, value: &str) -> Result<(), ConfigError> {
        self.pagination = value.parse()?;
        Ok(())
    }

    pub fn set_eager_loading(&mut self, value: &str) -> Result<(), ConfigError> {
        self.eager_loading = value.parse()?;
        Ok(())
    }

    pub fn set_type_suffix(&mut self, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::Blank {
                setting: "type suffix",
            });
        }
        self.type_suffix = value.to_string();
        Ok(())
    }

    pub fn set_decimal_separator(&mut self, value: &str) -> Result<(), ConfigError> {
        self.decimal_separator = match value.trim() {
            "." => DecimalSeparator::Point,
            "," => DecimalSeparator::Comma,
            other => other.parse()?,
        };
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    authorization: Option<String>,
    search: Option<String>,
    pagination: Option<String>,
    eager_loading: Option<String>,
    type_suffix: Option<String>,
    decimal_separator: Option<String>,
}

impl TryFrom<RawConfig> for ManagerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut config = ManagerConfig::default();
        if let Some(v) = raw.authorization {
            config.set_authorization_adapter(&v)?;
        }
        if let Some(v) = raw.search {
            config.set_search_adapter(&v)?;
        }
        if let Some(v) = raw.pagination {
            config.set_pagination_adapter(&v)?;
        }
        if let Some(v) = raw.eager_loading {
            config.set_eager_loading(&v)?;
        }
        if let Some(v) = raw.type_suffix {
            config.set_type_suffix(&v)?;
        }
        if let Some(v) = raw.decimal_separator {
            config.set_decimal_separator(&v)?;
        }
        Ok(config)
    }
}

// =============================================================================
// PROCESS-WIDE REGISTRY
// =============================================================================

static REGISTRY: LazyLock<RwLock<ManagerConfig>> =
    LazyLock::new(|| RwLock::new(ManagerConfig::default()));

fn update(
    f: impl FnOnce(&mut ManagerConfig) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    let mut guard = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    // Validate on a copy so a rejected value leaves the registry untouched.
    let mut next = guard.clone();
    f(&mut next)?;
    *guard = next;
    info!(config = ?*guard, "Configuration updated");
    Ok(())
}

/// Snapshot of the current registry.
pub fn current() -> ManagerConfig {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the whole registry with an already validated configuration.
pub fn install(config: ManagerConfig) {
    let mut guard = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    *guard = config;
    info!(config = ?*guard, "Configuration installed");
}

/// Restores every setting to its default.
pub fn reset() {
    install(ManagerConfig::default());
}

pub fn set_authorization_adapter(value: &str) -> Result<(), ConfigError> {
    update(|c| c.set_authorization_adapter(value))
}

pub fn set_search_adapter(value: &str) -> Result<(), ConfigError> {
    update(|c| c.set_search_adapter(value))
}

pub fn set_pagination_adapter(value: &str) -> Result<(), ConfigError> {
    update(|c| c.set_pagination_adapter(value))
}

pub fn set_eager_loading(value: &str) -> Result<(), ConfigError> {
    update(|c| c.set_eager_loading(value))
}

pub fn set_type_suffix(value: &str) -> Result<(), ConfigError> {
    update(|c| c.set_type_suffix(value))
}

pub fn set_decimal_separator(value: &str) -> Result<(), ConfigError> {
    update(|c| c.set_decimal_separator(value))
}
