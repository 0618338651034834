//! Identity, profile, and bookmark records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// A principal authenticated by the credential provider.
///
/// Only identities with `email_verified == true` ever leave
/// [`crate::AuthFlow`]; unverified ones are forced back to signed-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-issued unique id. Also the profile record key.
    pub id: String,
    /// Account email.
    pub email: String,
    /// Whether the provider has confirmed the email address.
    pub email_verified: bool,
    /// Display name held by the provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar URL from a federated provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Gender chosen at sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(ValidationError::MissingGender),
        }
    }
}

/// Persisted user-chosen attributes, one per identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_welcome_email_sent: bool,
    /// Verification flag as last observed when the record was written.
    #[serde(default)]
    pub email_verified: bool,
}

impl ProfileRecord {
    /// Empty record for `id`, used as the base of a merge into a missing record.
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            email: String::new(),
            display_name: String::new(),
            gender: None,
            created_at: None,
            last_login: None,
            has_welcome_email_sent: false,
            email_verified: false,
        }
    }

    /// Apply a field patch in place. `None` fields are left untouched.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(display_name) = &update.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(gender) = update.gender {
            self.gender = Some(gender);
        }
        if let Some(created_at) = update.created_at {
            self.created_at = Some(created_at);
        }
        if let Some(last_login) = update.last_login {
            self.last_login = Some(last_login);
        }
        if let Some(sent) = update.has_welcome_email_sent {
            self.has_welcome_email_sent = sent;
        }
        if let Some(verified) = update.email_verified {
            self.email_verified = verified;
        }
    }
}

/// Field patch written to the profile store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_welcome_email_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

/// How a profile write combines with an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Patch only the fields that are set.
    Merge,
    /// Replace the whole record; unset fields return to defaults.
    Replace,
}

/// Credentials and choices held between account creation and verification.
///
/// Also created when sign-in reaches an existing unverified account. The
/// password is kept only so the verification mail can be resent; federated
/// accounts have none.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub email: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub gender: Option<Gender>,
    /// Provider id of the unverified account, when the provider returned one.
    pub identity_id: Option<String>,
}

impl fmt::Debug for PendingVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingVerification")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("display_name", &self.display_name)
            .field("gender", &self.gender)
            .field("identity_id", &self.identity_id)
            .finish()
    }
}

/// Kind of bookmarked title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// A bookmarked movie or show in the identity's bookmark sub-collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub media_type: MediaType,
    pub media_id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Bookmark {
    /// Stable key inside the sub-collection, e.g. `movie:603`.
    pub fn key(&self) -> String {
        bookmark_key(self.media_type, self.media_id)
    }
}

/// Key for a bookmark of `media_type`/`media_id`.
pub fn bookmark_key(media_type: MediaType, media_id: u64) -> String {
    format!("{}:{}", media_type.as_str(), media_id)
}
