//! Project model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserRef;

/// The remote display palette for projects.
///
/// Unknown palette names (the remote adds colors occasionally) degrade to
/// `Unknown` instead of failing the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectColor {
    DarkPink,
    DarkGreen,
    DarkBlue,
    DarkRed,
    DarkTeal,
    DarkBrown,
    DarkOrange,
    DarkPurple,
    DarkWarmGray,
    LightPink,
    LightGreen,
    LightBlue,
    LightRed,
    LightTeal,
    LightBrown,
    LightOrange,
    LightPurple,
    LightWarmGray,
    None,
    #[serde(other)]
    Unknown,
}

/// Color of a project status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Red,
    Blue,
    #[serde(other)]
    Unknown,
}

/// The most recent status update posted on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: Option<StatusColor>,
}

/// A project as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub color: Option<ProjectColor>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub owner: Option<UserRef>,
    #[serde(default)]
    pub members: Vec<UserRef>,
    #[serde(default)]
    pub current_status: Option<ProjectStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_project() {
        let payload = r#"{
            "gid": "55",
            "name": "Launch",
            "archived": false,
            "color": "dark-teal",
            "modified_at": "2026-08-01T09:30:00.000Z",
            "owner": { "gid": "88", "name": "Sam" },
            "members": [{ "gid": "88", "name": "Sam" }, { "gid": "89", "name": "Ada" }],
            "current_status": { "title": "On track", "color": "green" }
        }"#;

        let project: Project = serde_json::from_str(payload).unwrap();
        assert_eq!(project.color, Some(ProjectColor::DarkTeal));
        assert_eq!(project.members.len(), 2);
        assert_eq!(
            project.current_status.unwrap().color,
            Some(StatusColor::Green)
        );
    }

    #[test]
    fn test_unknown_color_does_not_fail_parsing() {
        let payload = r#"{
            "gid": "55",
            "name": "Launch",
            "color": "hot-magenta",
            "modified_at": "2026-08-01T09:30:00.000Z"
        }"#;

        let project: Project = serde_json::from_str(payload).unwrap();
        assert_eq!(project.color, Some(ProjectColor::Unknown));
    }

    #[test]
    fn test_null_color_is_absent() {
        let payload = r#"{
            "gid": "55",
            "name": "Launch",
            "color": null,
            "modified_at": "2026-08-01T09:30:00.000Z"
        }"#;

        let project: Project = serde_json::from_str(payload).unwrap();
        assert_eq!(project.color, None);
    }
}
