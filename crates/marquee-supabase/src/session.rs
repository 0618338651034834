//! In-memory Supabase session shared by the provider and the profile store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marquee_auth::Identity;
use parking_lot::Mutex;
use serde::Deserialize;

/// Tokens for the signed-in user. Never logged.
#[derive(Clone)]
pub struct SupabaseSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl std::fmt::Debug for SupabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseSession")
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Cloneable handle on the current session.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Option<SupabaseSession>>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SupabaseSession> {
        self.inner.lock().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().as_ref().map(|s| s.identity.clone())
    }

    /// Access token, if a session exists and has not expired.
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .lock()
            .as_ref()
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.access_token.clone())
    }

    pub(crate) fn set(&self, session: SupabaseSession) {
        *self.inner.lock() = Some(session);
    }

    pub(crate) fn take(&self) -> Option<SupabaseSession> {
        self.inner.lock().take()
    }
}

/// `user` object returned by GoTrue.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GoTrueUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    /// Empty for the obfuscated user GoTrue returns when signing up an
    /// email that is already registered.
    #[serde(default)]
    pub identities: Option<Vec<serde_json::Value>>,
}

impl GoTrueUser {
    fn metadata_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.user_metadata.get(*key))
            .filter_map(|value| value.as_str())
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn into_identity(self) -> Identity {
        Identity {
            email_verified: self.email_confirmed_at.is_some() || self.confirmed_at.is_some(),
            display_name: self.metadata_str(&["display_name", "full_name", "name"]),
            photo_url: self.metadata_str(&["avatar_url", "picture"]),
            email: self.email.unwrap_or_default(),
            id: self.id,
        }
    }
}

/// Response of the token and (auto-confirmed) signup endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: GoTrueUser,
}

impl TokenResponse {
    pub fn into_session(self) -> SupabaseSession {
        SupabaseSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            identity: self.user.into_identity(),
        }
    }
}
