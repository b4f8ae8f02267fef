//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Where an account came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Github,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

/// User record stored in the document store.
///
/// `email` is unique across all users, `github_id` is unique when present.
/// Records are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Internal id (also used as document ID)
    pub id: String,
    /// Normalized (trimmed, lower-case) email
    pub email: String,
    /// bcrypt hash; absent for OAuth-only accounts
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: AuthProvider,
    /// GitHub numeric id, stored as a string
    pub github_id: Option<String>,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

impl User {
    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(github_id) = &patch.github_id {
            self.github_id = Some(github_id.clone());
        }
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(last_login) = &patch.last_login {
            self.last_login = Some(last_login.clone());
        }
        self.updated_at = patch.updated_at.clone();
    }
}

/// Fields that may change after a user is created.
///
/// `None` leaves a field untouched. `updated_at` is always bumped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub github_id: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_login: Option<String>,
    pub updated_at: String,
}

/// Public view of a user (no credential material).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: AuthProvider,
    pub subscription_tier: SubscriptionTier,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            provider: user.provider,
            subscription_tier: user.subscription_tier,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}
