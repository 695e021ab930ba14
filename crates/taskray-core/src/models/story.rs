//! Story (task activity) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserRef;

/// One entry in a task's activity feed: a user comment or a system event
/// (assignment changes, completion, etc.).
///
/// Stories are fetched lazily per task when the user opens the activity
/// view; they are never part of the poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub gid: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<UserRef>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub resource_subtype: String,
}

impl Story {
    /// Whether this story is a user-authored comment (as opposed to system
    /// activity).
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.resource_subtype == "comment_added"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comment_story() {
        let payload = r#"{
            "gid": "901",
            "created_at": "2026-08-01T10:00:00.000Z",
            "created_by": { "gid": "88", "name": "Sam" },
            "text": "Looks good to me",
            "resource_subtype": "comment_added"
        }"#;

        let story: Story = serde_json::from_str(payload).unwrap();
        assert!(story.is_comment());
        assert_eq!(story.created_by.unwrap().name, "Sam");
    }

    #[test]
    fn test_system_story_is_not_comment() {
        let payload = r#"{
            "gid": "902",
            "created_at": "2026-08-01T10:00:00.000Z",
            "text": "marked this task complete",
            "resource_subtype": "marked_complete"
        }"#;

        let story: Story = serde_json::from_str(payload).unwrap();
        assert!(!story.is_comment());
    }
}
