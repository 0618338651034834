//! Mapping of GoTrue and PostgREST failures onto the auth error types.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use marquee_auth::{ProviderError, StoreError};
use reqwest::StatusCode;
use serde::Deserialize;

/// Length and digest of a response body, safe to log.
pub(crate) fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// GoTrue error body. Newer servers send `error_code`/`msg`, older ones
/// `error`/`error_description`.
#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl GoTrueErrorBody {
    fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }

    fn message(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .or(self.error_description.as_deref())
            .or(self.message.as_deref())
    }
}

/// Map a non-success GoTrue response onto a [`ProviderError`].
pub(crate) fn map_auth_error(status: StatusCode, body: &str) -> ProviderError {
    let parsed: GoTrueErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    if status.is_server_error() {
        return ProviderError::Network(message);
    }

    // Old servers report unconfirmed sign-ins as a generic invalid_grant.
    if message.eq_ignore_ascii_case("email not confirmed") {
        return ProviderError::EmailNotVerified;
    }

    match parsed.code() {
        Some("invalid_credentials" | "invalid_grant") => ProviderError::BadCredential,
        Some("user_not_found") => ProviderError::NoAccount,
        Some("email_exists" | "user_already_exists") => ProviderError::EmailInUse,
        Some("email_not_confirmed") => ProviderError::EmailNotVerified,
        Some("weak_password") => ProviderError::WeakPassword(message),
        Some("session_not_found" | "no_authorization") => ProviderError::NoSession,
        _ => ProviderError::Other(message),
    }
}

/// Map a transport failure from `reqwest`.
pub(crate) fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else if error.is_decode() {
        ProviderError::Other(format!("Unexpected response: {}", error))
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Postgres `insufficient_privilege`, raised by row level security.
const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Map a non-success PostgREST response onto a [`StoreError`].
pub(crate) fn map_rest_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: RestErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| format!("HTTP {} ({})", status.as_u16(), summarize_response_body(body)));

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || parsed.code.as_deref() == Some(PG_INSUFFICIENT_PRIVILEGE)
    {
        StoreError::PermissionDenied(message)
    } else if status.is_server_error() {
        StoreError::Network(message)
    } else {
        StoreError::Other(message)
    }
}

pub(crate) fn map_store_transport_error(error: reqwest::Error) -> StoreError {
    if error.is_decode() {
        StoreError::Other(format!("Unexpected response: {}", error))
    } else {
        StoreError::Network(error.to_string())
    }
}
