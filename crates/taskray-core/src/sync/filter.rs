//! Filter policy applied to fetched entity sets.
//!
//! Three pruning steps in a fixed precedence order: the inclusion allowlist
//! (when non-empty), then exclusion by exact GID, then exclusion by name
//! pattern. Patterns are literal substrings matched case-insensitively —
//! never anchored, never regex.

use std::collections::HashSet;

use crate::models::{FilterLists, Project, Task};

/// Anything the policy can prune: has a GID and a display name.
pub trait Filterable {
    fn gid(&self) -> &str;
    fn name(&self) -> &str;
}

impl Filterable for Task {
    fn gid(&self) -> &str {
        &self.gid
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Filterable for Project {
    fn gid(&self) -> &str {
        &self.gid
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A compiled filter policy for one entity kind.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    include_names: Vec<String>,
    exclude_gids: HashSet<String>,
    exclude_names: Vec<String>,
}

impl FilterPolicy {
    #[must_use]
    pub fn new(lists: &FilterLists) -> Self {
        Self {
            include_names: lowercased(&lists.include_names),
            exclude_gids: lists.exclude_gids.iter().cloned().collect(),
            exclude_names: lowercased(&lists.exclude_names),
        }
    }

    /// Apply the policy, keeping input order of the surviving items.
    #[must_use]
    pub fn apply<T: Filterable>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.keeps(item))
            .collect()
    }

    fn keeps<T: Filterable>(&self, item: &T) -> bool {
        let name = item.name().to_lowercase();

        if !self.include_names.is_empty()
            && !self
                .include_names
                .iter()
                .any(|pattern| name.contains(pattern))
        {
            return false;
        }

        if self.exclude_gids.contains(item.gid()) {
            return false;
        }

        !self
            .exclude_names
            .iter()
            .any(|pattern| name.contains(pattern))
    }
}

fn lowercased(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|pattern| pattern.to_lowercase())
        .collect()
}

/// Merge task lists by GID, keeping the first-encountered record.
#[must_use]
pub fn dedupe_by_gid(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| seen.insert(task.gid.clone()))
        .collect()
}

/// Keep only tasks whose assignee GID is in the allowed set.
///
/// The remote search endpoint is over-broad — it also returns tasks where a
/// requested user is merely a collaborator or follower — so this strict
/// client-side check is mandatory after every assignee-scoped fetch.
#[must_use]
pub fn retain_assigned_to(tasks: Vec<Task>, allowed_gids: &HashSet<String>) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| {
            task.assignee
                .as_ref()
                .is_some_and(|assignee| allowed_gids.contains(&assignee.gid))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::UserRef;

    fn item(gid: &str, name: &str) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        Task {
            gid: gid.to_string(),
            name: name.to_string(),
            assignee: None,
            completed: false,
            due_on: None,
            due_at: None,
            modified_at: now,
            created_at: now,
            num_subtasks: 0,
            projects: Vec::new(),
            memberships: Vec::new(),
        }
    }

    fn assigned(gid: &str, name: &str, assignee_gid: &str) -> Task {
        let mut task = item(gid, name);
        task.assignee = Some(UserRef {
            gid: assignee_gid.to_string(),
            name: String::new(),
        });
        task
    }

    fn gids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.gid.as_str()).collect()
    }

    #[test]
    fn test_empty_policy_keeps_everything() {
        let policy = FilterPolicy::new(&FilterLists::default());
        let filtered = policy.apply(vec![item("1", "A"), item("2", "B")]);
        assert_eq!(gids(&filtered), vec!["1", "2"]);
    }

    #[test]
    fn test_inclusion_is_an_opt_in_allowlist() {
        let policy = FilterPolicy::new(&FilterLists {
            include_names: vec!["launch".to_string()],
            ..FilterLists::default()
        });

        let filtered = policy.apply(vec![
            item("1", "Launch plan"),
            item("2", "Retro notes"),
            item("3", "Pre-LAUNCH checklist"),
        ]);
        assert_eq!(gids(&filtered), vec!["1", "3"], "match is case-insensitive");
    }

    #[test]
    fn test_exclusion_by_gid_beats_inclusion_match() {
        // Scenario from the menu-bar behavior: an item matching the
        // allowlist is still dropped when its GID is excluded.
        let policy = FilterPolicy::new(&FilterLists {
            include_names: vec!["launch".to_string()],
            exclude_gids: vec!["42".to_string()],
            exclude_names: Vec::new(),
        });

        let filtered = policy.apply(vec![
            item("1", "Launch plan"),
            item("42", "Launch review"),
            item("7", "Other"),
        ]);
        assert_eq!(gids(&filtered), vec!["1"]);
    }

    #[test]
    fn test_exclusion_by_name_pattern() {
        let policy = FilterPolicy::new(&FilterLists {
            exclude_names: vec!["WIP".to_string()],
            ..FilterLists::default()
        });

        let filtered = policy.apply(vec![item("1", "Ready"), item("2", "wip: draft")]);
        assert_eq!(gids(&filtered), vec!["1"]);
    }

    #[test]
    fn test_result_is_invariant_to_list_construction_order() {
        let forward = FilterLists {
            include_names: vec!["a".to_string(), "b".to_string()],
            exclude_gids: vec!["1".to_string(), "2".to_string()],
            exclude_names: vec!["x".to_string(), "y".to_string()],
        };
        let reversed = FilterLists {
            include_names: vec!["b".to_string(), "a".to_string()],
            exclude_gids: vec!["2".to_string(), "1".to_string()],
            exclude_names: vec!["y".to_string(), "x".to_string()],
        };

        let items = || {
            vec![
                item("1", "alpha"),
                item("2", "beta"),
                item("3", "a plain"),
                item("4", "b with x"),
                item("5", "carrot"),
            ]
        };

        let left = FilterPolicy::new(&forward).apply(items());
        let right = FilterPolicy::new(&reversed).apply(items());
        assert_eq!(gids(&left), gids(&right));
        assert_eq!(gids(&left), vec!["3"]);
    }

    #[test]
    fn test_dedupe_keeps_first_encountered_record() {
        let merged = dedupe_by_gid(vec![
            assigned("1", "From fetch A", "88"),
            assigned("2", "Only in A", "88"),
            assigned("1", "From fetch B", "89"),
        ]);

        assert_eq!(gids(&merged), vec!["1", "2"]);
        assert_eq!(merged[0].name, "From fetch A");
    }

    #[test]
    fn test_retain_assigned_drops_followed_tasks() {
        let allowed: HashSet<String> = ["88".to_string()].into_iter().collect();

        let tasks = vec![
            assigned("1", "Mine", "88"),
            assigned("2", "Someone else's, I just follow it", "99"),
            item("3", "Unassigned"),
        ];

        let kept = retain_assigned_to(tasks, &allowed);
        assert_eq!(gids(&kept), vec!["1"]);
    }

    #[test]
    fn test_retain_assigned_is_idempotent() {
        let allowed: HashSet<String> = ["88".to_string(), "89".to_string()].into_iter().collect();

        let tasks = vec![
            assigned("1", "A", "88"),
            assigned("2", "B", "89"),
            assigned("3", "C", "99"),
        ];

        let once = retain_assigned_to(tasks, &allowed);
        let twice = retain_assigned_to(once.clone(), &allowed);
        assert_eq!(once, twice);
    }
}
