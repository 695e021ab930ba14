//! Task model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A shallow reference to a user, as embedded in other entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

/// A shallow reference to a project, as embedded in tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

/// A shallow reference to a section within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRef {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}

/// A task's placement inside one project (project + section pairing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub project: ProjectRef,
    #[serde(default)]
    pub section: Option<SectionRef>,
}

/// A task as returned by the remote API.
///
/// The GID is the stable identity of a task within a workspace; every other
/// field may change between polls. `modified_at` is non-decreasing for an
/// unchanged task, which is what the activity highlighting relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignee: Option<UserRef>,
    #[serde(default)]
    pub completed: bool,
    /// Date-only due date (mutually exclusive with `due_at` on the wire)
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    /// Due date with a time component
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub num_subtasks: u32,
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl Task {
    /// Whether the task changed since the user last opened its activity view.
    ///
    /// A task with no recorded seen-timestamp always counts as fresh.
    #[must_use]
    pub fn has_new_activity(&self, seen_at: Option<&DateTime<Utc>>) -> bool {
        seen_at.is_none_or(|seen| self.modified_at > *seen)
    }

    /// Whether the task is assigned to the given user GID.
    #[must_use]
    pub fn is_assigned_to(&self, user_gid: &str) -> bool {
        self.assignee
            .as_ref()
            .is_some_and(|assignee| assignee.gid == user_gid)
    }
}
