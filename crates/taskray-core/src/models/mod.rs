//! Data models for taskray

mod project;
mod settings;
mod story;
mod task;
mod user;

pub use project::{Project, ProjectColor, ProjectStatus, StatusColor};
pub use settings::{
    clamp_poll_minutes, AssigneeScope, FilterLists, Settings, MAX_POLL_MINUTES, MIN_POLL_MINUTES,
};
pub use story::Story;
pub use task::{Membership, ProjectRef, SectionRef, Task, UserRef};
pub use user::{User, UserPhoto};

/// An opaque workspace reference returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Workspace {
    pub gid: String,
    #[serde(default)]
    pub name: String,
}
