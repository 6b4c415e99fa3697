//! User accounts as returned by the backend's admin endpoints.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_guest: bool,
    #[serde(default)]
    pub profile_image_key: Option<String>,
}

impl User {
    /// Label used in selection lists: the username, falling back to the
    /// email, followed by the ID.
    #[must_use]
    pub fn label(&self) -> String {
        let name = self
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("-");
        format!("{name} (ID: {})", self.id)
    }

    /// Case-insensitive substring match over email and username.
    ///
    /// `needle` must already be lowercased.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        [self.email.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Writable fields of a user, sent on `PUT /admin/users/{id}`.
///
/// `profile_image_key` is always serialized; `null` clears the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    pub username: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub profile_image_key: Option<String>,
}
