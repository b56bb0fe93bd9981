//! Account data model.
//!
//! `UserRecord` is the stored document and carries the secret material
//! (password hash, refresh-token digests). `User` is the external view and
//! has no field for either, so neither can leak through a response.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    /// SHA-256 hex digest of the refresh token string.
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn new(token_hash: String) -> Self {
        Self {
            token_hash,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_layout_id: Option<String>,
    #[serde(default)]
    pub privacy: HashMap<String, serde_json::Value>,
}

impl UserSettings {
    /// Overlay the fields present in `update` onto these settings.
    pub fn merge(&mut self, update: UserSettings) {
        if update.theme.is_some() {
            self.theme = update.theme;
        }
        if update.default_layout_id.is_some() {
            self.default_layout_id = update.default_layout_id;
        }
        self.privacy.extend(update.privacy);
    }
}

/// Stored account document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    /// Absent for OAuth-only accounts, and stripped by lookups that do not
    /// ask for the secret.
    pub password_hash: Option<String>,
    pub is_verified: bool,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshTokenRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn has_active_refresh_token(&self, token_hash: &str) -> bool {
        self.refresh_tokens
            .iter()
            .any(|t| t.token_hash == token_hash && t.is_active())
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }

    /// Copy without the password hash.
    pub fn without_secret(&self) -> Self {
        Self {
            password_hash: None,
            ..self.clone()
        }
    }
}

/// External view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            is_verified: record.is_verified,
            avatar_url: record.avatar_url.clone(),
            settings: record.settings.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User::from(&record)
    }
}

/// Input for `CredentialStore::create`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettings>,
}

/// The identity carried inside a signed token and attached to authenticated
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}
