//! Application settings model

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds for the polling interval, in minutes.
pub const MIN_POLL_MINUTES: u32 = 1;
pub const MAX_POLL_MINUTES: u32 = 60;

/// Which users' tasks the poll cycle fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssigneeScope {
    /// Only tasks assigned to the current user
    #[default]
    Mine,
    /// Tasks assigned to an explicit selection of users
    Selected,
    /// All incomplete tasks in the workspace
    Everyone,
}

/// Inclusion/exclusion lists applied to one entity kind (tasks or projects).
///
/// Patterns are literal substrings matched case-insensitively; GIDs are
/// matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLists {
    /// Opt-in allowlist: when non-empty, an item must match one of these
    pub include_names: Vec<String>,
    pub exclude_gids: Vec<String>,
    pub exclude_names: Vec<String>,
}

impl FilterLists {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include_names.is_empty()
            && self.exclude_gids.is_empty()
            && self.exclude_names.is_empty()
    }
}

/// Application settings, persisted as individual key/value rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Poll interval in minutes (clamped to 1-60 when used)
    pub poll_interval_minutes: u32,
    /// GID of the signed-in user, once known
    pub current_user_gid: Option<String>,
    /// Assignment-filter mode for the poll cycle
    pub assignee_scope: AssigneeScope,
    /// Users whose tasks are fetched in `Selected` scope
    pub selected_user_gids: Vec<String>,
    pub task_filters: FilterLists,
    pub project_filters: FilterLists,
    pub pinned_task_gids: Vec<String>,
    pub pinned_project_gids: Vec<String>,
    /// Whether completed tasks remain visible in list views
    pub show_completed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 5,
            current_user_gid: None,
            assignee_scope: AssigneeScope::Mine,
            selected_user_gids: Vec::new(),
            task_filters: FilterLists::default(),
            project_filters: FilterLists::default(),
            pinned_task_gids: Vec::new(),
            pinned_project_gids: Vec::new(),
            show_completed: false,
        }
    }
}

impl Settings {
    /// The effective poll period, with the interval clamped to its bounds.
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(u64::from(clamp_poll_minutes(self.poll_interval_minutes)) * 60)
    }
}

/// Clamp a poll interval to the supported 1-60 minute range.
#[must_use]
pub const fn clamp_poll_minutes(minutes: u32) -> u32 {
    if minutes < MIN_POLL_MINUTES {
        MIN_POLL_MINUTES
    } else if minutes > MAX_POLL_MINUTES {
        MAX_POLL_MINUTES
    } else {
        minutes
    }
}
