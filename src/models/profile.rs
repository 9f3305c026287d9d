//! Public profile rows (`perfil`), keyed by the auth user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "nombre_completo", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(rename = "enlaces", default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Profile {
    const TABLE: &'static str = "perfil";
}

impl Profile {
    /// Case-insensitive substring match on username or display name.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.username.to_lowercase().contains(needle_lower)
            || self
                .display_name
                .as_deref()
                .map(|name| name.to_lowercase().contains(needle_lower))
                .unwrap_or(false)
    }
}

/// Row inserted once at sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: String,
}

impl NewProfile {
    pub fn new(id: Uuid, username: &str) -> Self {
        Self {
            id,
            username: normalize_username(username),
        }
    }
}

/// Usernames are unique case-insensitively, so they are stored lowercased.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_trimmed_and_lowercased() {
        assert_eq!(normalize_username("  UserName "), "username");
        let payload = NewProfile::new(Uuid::nil(), "MiXeD");
        assert_eq!(payload.username, "mixed");
    }

    #[test]
    fn matches_display_name_without_case() {
        let profile = Profile {
            id: Uuid::nil(),
            username: "runner42".into(),
            display_name: Some("Ana García".into()),
            bio: None,
            links: Vec::new(),
            avatar_url: None,
            created_at: None,
        };
        assert!(profile.matches("garcía"));
        assert!(profile.matches("runner"));
        assert!(!profile.matches("cyclist"));
    }
}
