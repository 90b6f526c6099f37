//! # Actions and Stages
//!
//! An [`Action`] is one of the seven lifecycle operations a manager offers.
//! Each action is a fixed sequence of [`Stage`]s; the table in
//! [`Action::stages`] is the single place that order is declared, and the
//! pipeline in [`crate::pipeline`] simply walks it.
//!
//! | Action | Stages |
//! |--------|--------|
//! | `list` | reset, authorized scope, search, order, named scopes, paginate, eager load, select, distinct |
//! | `read` / `edit` | reset, base scope, eager load, select, extension, find, authorize |
//! | `new` | reset, build, authorize, extension |
//! | `create` | reset, build, authorize, atomic { extension, persist } |
//! | `update` | reset, base scope, eager load, find, authorize, assign, extension, save |
//! | `delete` | reset, base scope, eager load, find, authorize, atomic { extension, destroy } |

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// A lifecycle operation offered by a manager type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Read,
    New,
    Create,
    Edit,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::List,
        Action::Read,
        Action::New,
        Action::Create,
        Action::Edit,
        Action::Update,
        Action::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Read => "read",
            Action::New => "new",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// The ordered stages this action runs.
    pub fn stages(self) -> &'static [Stage] {
        use Stage::*;
        match self {
            Action::List => &[
                Reset,
                AuthorizedScope,
                Search,
                Order,
                NamedScopes,
                Paginate,
                EagerLoad,
                Select,
                Distinct,
            ],
            Action::Read | Action::Edit => &[
                Reset, BaseScope, EagerLoad, Select, Extension, Find, Authorize,
            ],
            Action::New => &[Reset, Build, Authorize, Extension],
            Action::Create => &[Reset, Build, Authorize, AtomicPersist],
            Action::Update => &[
                Reset, BaseScope, EagerLoad, Find, Authorize, Assign, Extension, Save,
            ],
            Action::Delete => &[Reset, BaseScope, EagerLoad, Find, Authorize, AtomicDestroy],
        }
    }

    /// Whether this action writes to the backend.
    pub fn is_write(self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(ConfigError::Blank { setting: "action" });
        }
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ConfigError::UnknownChoice {
                setting: "action",
                value: value.to_string(),
            })
    }
}

/// The set of actions a manager type mixes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSet(u8);

impl ActionSet {
    pub fn all() -> Self {
        Self::only(Action::ALL)
    }

    pub fn none() -> Self {
        Self(0)
    }

    pub fn only(actions: impl IntoIterator<Item = Action>) -> Self {
        actions.into_iter().fold(Self::none(), Self::with)
    }

    pub fn except(actions: impl IntoIterator<Item = Action>) -> Self {
        actions.into_iter().fold(Self::all(), Self::without)
    }

    pub fn with(self, action: Action) -> Self {
        Self(self.0 | Self::bit(action))
    }

    pub fn without(self, action: Action) -> Self {
        Self(self.0 & !Self::bit(action))
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0 & Self::bit(action) != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.contains(*a))
    }

    fn bit(action: Action) -> u8 {
        1 << action as u8
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::all()
    }
}

/// One orchestration step of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Clear per-call state.
    Reset,
    /// Authorize the entity type, then start from the authorization-scoped query.
    AuthorizedScope,
    /// Start from the backend's unrestricted query for the entity type.
    BaseScope,
    Search,
    Order,
    NamedScopes,
    Paginate,
    EagerLoad,
    Select,
    Distinct,
    /// Build an unsaved record from defaults and normalized attributes.
    Build,
    Find,
    /// Authorize the concrete record.
    Authorize,
    /// Assign normalized attributes onto the found record.
    Assign,
    /// Caller-supplied step.
    Extension,
    /// Non-raising save whose boolean is the result.
    Save,
    /// Atomic unit: extension, then raising save.
    AtomicPersist,
    /// Atomic unit: extension, then raising destroy.
    AtomicDestroy,
}

/// Where a manager instance is within its current action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No action has run yet.
    Idle,
    Reset,
    Scoped,
    Searched,
    Ordered,
    Filtered,
    Paged,
    Built,
    Found,
    Authorized,
    Extended,
    Executed,
    /// The action finished and any write took effect.
    Committed,
    /// The write did not take effect; atomic units were rolled back.
    RolledBack,
    /// Authorization refused the action.
    Denied,
    /// Any other error stopped the pipeline.
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Committed
                | PipelineState::RolledBack
                | PipelineState::Denied
                | PipelineState::Aborted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_action_starts_with_reset() {
        for action in Action::ALL {
            assert_eq!(action.stages()[0], Stage::Reset, "{action}");
        }
    }

    #[test]
    fn test_list_authorizes_the_type_before_anything_else() {
        let stages = Action::List.stages();
        assert_eq!(stages[1], Stage::AuthorizedScope);
        assert!(!stages.contains(&Stage::Authorize));
    }

    #[test]
    fn test_read_runs_extension_before_find_and_authorizes_last() {
        let stages = Action::Read.stages();
        let ext = stages.iter().position(|s| *s == Stage::Extension).unwrap();
        let find = stages.iter().position(|s| *s == Stage::Find).unwrap();
        assert!(ext < find);
        assert_eq!(stages.last(), Some(&Stage::Authorize));
        assert_eq!(stages, Action::Edit.stages());
    }

    #[test]
    fn test_update_extension_follows_assignment() {
        let stages = Action::Update.stages();
        let assign = stages.iter().position(|s| *s == Stage::Assign).unwrap();
        let ext = stages.iter().position(|s| *s == Stage::Extension).unwrap();
        assert_eq!(ext, assign + 1);
        assert_eq!(stages.last(), Some(&Stage::Save));
    }

    #[test]
    fn test_action_set_composition() {
        let set = ActionSet::only([Action::List, Action::Read]);
        assert!(set.contains(Action::List));
        assert!(!set.contains(Action::Delete));
        assert_eq!(set.iter().count(), 2);

        let writable = ActionSet::except([Action::Delete]);
        assert_eq!(writable.iter().count(), 6);
        assert!(ActionSet::all().contains(Action::Delete));
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("Update".parse::<Action>().unwrap(), Action::Update);
        assert!(matches!(
            "".parse::<Action>(),
            Err(ConfigError::Blank { .. })
        ));
        assert!(matches!(
            "archive".parse::<Action>(),
            Err(ConfigError::UnknownChoice { .. })
        ));
    }
}
