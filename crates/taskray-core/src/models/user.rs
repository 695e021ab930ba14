//! User model

use serde::{Deserialize, Serialize};

/// Avatar URLs attached to a user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhoto {
    #[serde(default)]
    pub image_60x60: Option<String>,
}

/// A workspace member.
///
/// Users are cached indefinitely once fetched; the cache is only repopulated
/// when it is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo: Option<UserPhoto>,
}

impl User {
    /// Avatar URL, if the remote record carried one.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.photo.as_ref()?.image_60x60.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_user() {
        let payload = r#"{
            "gid": "88",
            "name": "Sam",
            "email": "sam@example.com",
            "photo": { "image_60x60": "https://example.com/sam.png" }
        }"#;

        let user: User = serde_json::from_str(payload).unwrap();
        assert_eq!(user.email.as_deref(), Some("sam@example.com"));
        assert_eq!(user.avatar_url(), Some("https://example.com/sam.png"));
    }

    #[test]
    fn test_parse_user_without_photo() {
        let user: User = serde_json::from_str(r#"{ "gid": "88", "name": "Sam" }"#).unwrap();
        assert!(user.email.is_none());
        assert!(user.avatar_url().is_none());
    }
}
