//! Credential provider backed by Supabase Auth (GoTrue).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marquee_auth::{CredentialProvider, Identity, ProviderError};
use marquee_config::Config;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{map_auth_error, map_transport_error, summarize_response_body};
use crate::session::{GoTrueUser, SharedSession, SupabaseSession, TokenResponse};

const FEDERATED_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_FEDERATED_TIMEOUT_SECS: u64 = 120;

/// Hands the federated login URL to the user (browser, terminal, ...).
pub type UrlOpener = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Federated login hand-off information.
#[derive(Debug, Clone)]
pub struct FederatedLoginStart {
    pub login_id: String,
    pub login_url: String,
}

#[derive(Debug, Deserialize)]
struct FederatedStatusResponse {
    status: String,
    #[serde(default)]
    session: Option<FederatedSession>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FederatedSession {
    access_token: String,
    refresh_token: String,
    expires_at: String,
}

/// Supabase Auth client holding one in-memory session.
pub struct SupabaseCredentialProvider {
    http_client: reqwest::Client,
    supabase_url: String,
    anon_key: String,
    web_app_url: String,
    federated_provider: String,
    federated_timeout: Duration,
    opener: Option<UrlOpener>,
    session: SharedSession,
    session_tx: watch::Sender<Option<Identity>>,
}

impl SupabaseCredentialProvider {
    /// Create a provider from configuration.
    pub fn new(config: &Config) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            http_client: reqwest::Client::new(),
            supabase_url: config.supabase_base(),
            anon_key: config.supabase_anon_key.clone(),
            web_app_url: config.web_app_base(),
            federated_provider: config.federated_provider.clone(),
            federated_timeout: Duration::from_secs(DEFAULT_FEDERATED_TIMEOUT_SECS),
            opener: None,
            session: SharedSession::new(),
            session_tx,
        }
    }

    /// Use `opener` to present the federated login URL.
    pub fn with_url_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Give up on a federated login after `timeout`.
    pub fn with_federated_timeout(mut self, timeout: Duration) -> Self {
        self.federated_timeout = timeout;
        self
    }

    /// Session handle for collaborators that call Supabase as the user.
    pub fn shared_session(&self) -> SharedSession {
        self.session.clone()
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }

    fn publish(&self, session: Option<SupabaseSession>) {
        let identity = session.as_ref().map(|s| s.identity.clone());
        match session {
            Some(session) => self.session.set(session),
            None => {
                self.session.take();
            }
        }
        self.session_tx.send_replace(identity);
    }

    /// POST a JSON body to a GoTrue endpoint with the anon key.
    async fn post_auth(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = self.auth_url(path);
        debug!(url = %url, "Calling Supabase Auth");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        check_status(response, path).await
    }

    /// Fetch the user behind an access token.
    async fn fetch_user(&self, access_token: &str) -> Result<GoTrueUser, ProviderError> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response, "user").await?;
        response.json().await.map_err(map_transport_error)
    }

    /// Mint a login id and the URL that starts the federated flow for it.
    pub fn start_federated_login(&self) -> FederatedLoginStart {
        let login_id = Uuid::new_v4().to_string();
        let login_url = format!(
            "{}/auth/federated?login_id={}&provider={}",
            self.web_app_url, login_id, self.federated_provider
        );
        FederatedLoginStart {
            login_id,
            login_url,
        }
    }

    /// Poll the web app until the federated login for `login_id` completes.
    pub async fn complete_federated_login(
        &self,
        login_id: &str,
    ) -> Result<Identity, ProviderError> {
        let status_url = format!(
            "{}/api/federated-login-status?login_id={}",
            self.web_app_url, login_id
        );
        let deadline = tokio::time::Instant::now() + self.federated_timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::Timeout);
            }

            let response = self
                .http_client
                .get(&status_url)
                .send()
                .await
                .map_err(map_transport_error)?;
            let status_code = response.status();
            if status_code.is_server_error() {
                return Err(ProviderError::Network(format!(
                    "Federated login status unavailable: HTTP {}",
                    status_code.as_u16()
                )));
            }
            let payload: FederatedStatusResponse =
                response.json().await.map_err(map_transport_error)?;

            match payload.status.as_str() {
                "pending" => {
                    tokio::time::sleep(Duration::from_secs(FEDERATED_POLL_INTERVAL_SECS)).await;
                }
                "success" => {
                    let session = payload.session.ok_or_else(|| {
                        ProviderError::Other("Missing federated session payload".to_string())
                    })?;
                    let user = self.fetch_user(&session.access_token).await?;
                    let expires_at = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
                        .map(|t| t.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now() + chrono::Duration::hours(1));

                    let session = SupabaseSession {
                        access_token: session.access_token,
                        refresh_token: session.refresh_token,
                        expires_at,
                        identity: user.into_identity(),
                    };
                    let identity = session.identity.clone();
                    self.publish(Some(session));
                    info!(user_id = %identity.id, "Federated sign-in complete");
                    return Ok(identity);
                }
                "expired" => return Err(ProviderError::Timeout),
                other => {
                    let error = payload.error.unwrap_or_else(|| "unknown error".to_string());
                    return Err(ProviderError::FederatedCancelled(format!(
                        "{} ({} {})",
                        error,
                        status_code.as_u16(),
                        other
                    )));
                }
            }
        }
    }
}

/// Pass successful responses through; map failures with a logged summary.
async fn check_status(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body_summary = summarize_response_body(&body);
    let error = map_auth_error(status, &body);
    debug!(
        operation = %operation,
        status = %status,
        body_summary = %body_summary,
        error = %error,
        "Supabase Auth request failed"
    );
    Err(error)
}

#[async_trait]
impl CredentialProvider for SupabaseCredentialProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        let response = self
            .post_auth(
                "token?grant_type=password",
                &serde_json::json!({
                    "email": email,
                    "password": password,
                }),
            )
            .await?;

        let token: TokenResponse = response.json().await.map_err(map_transport_error)?;
        let session = token.into_session();
        let identity = session.identity.clone();
        self.publish(Some(session));

        debug!(user_id = %identity.id, verified = identity.email_verified, "Password sign-in accepted");
        Ok(identity)
    }

    async fn sign_in_with_federated_provider(&self) -> Result<Identity, ProviderError> {
        let start = self.start_federated_login();

        match &self.opener {
            Some(opener) => opener(&start.login_url).map_err(|e| {
                ProviderError::FederatedCancelled(format!("Could not open login page: {}", e))
            })?,
            None => info!(url = %start.login_url, "Open this URL to continue sign-in"),
        }

        self.complete_federated_login(&start.login_id).await
    }

    async fn create_account_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, ProviderError> {
        let response = self
            .post_auth(
                "signup",
                &serde_json::json!({
                    "email": email,
                    "password": password,
                    "data": { "display_name": display_name },
                }),
            )
            .await?;

        let body: serde_json::Value = response.json().await.map_err(map_transport_error)?;
        let (identity, session) = classify_signup(body)?;
        if let Some(session) = session {
            self.publish(Some(session));
        }

        info!(user_id = %identity.id, "Supabase account created");
        Ok(identity)
    }

    async fn update_display_name(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<(), ProviderError> {
        let access_token = match self.session.get() {
            Some(session) if session.identity.id == identity.id => session.access_token,
            _ => return Err(ProviderError::NoSession),
        };

        let response = self
            .http_client
            .put(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "data": { "display_name": display_name } }))
            .send()
            .await
            .map_err(map_transport_error)?;

        check_status(response, "update user").await?;
        Ok(())
    }

    async fn send_verification_email(&self, email: &str) -> Result<(), ProviderError> {
        self.post_auth(
            "resend",
            &serde_json::json!({
                "type": "signup",
                "email": email,
            }),
        )
        .await?;
        debug!("Verification email requested");
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError> {
        self.post_auth("recover", &serde_json::json!({ "email": email }))
            .await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(session) = self.session.get() else {
            self.publish(None);
            return Ok(());
        };

        let result = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await;

        // The local session is dropped whatever the server says.
        self.publish(None);

        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(
                    status = %status,
                    body_summary = %summarize_response_body(&body),
                    "Supabase logout rejected"
                );
                Err(map_auth_error(status, &body))
            }
            Err(error) => Err(map_transport_error(error)),
        }
    }

    fn observe_session_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.session_tx.subscribe()
    }
}

/// Read a signup response body.
///
/// With email confirmation on, GoTrue returns the bare user; with auto-confirm
/// it returns a session. An already registered email comes back as a user
/// with no identities.
fn classify_signup(
    body: serde_json::Value,
) -> Result<(Identity, Option<SupabaseSession>), ProviderError> {
    let unexpected = |e: serde_json::Error| {
        ProviderError::Other(format!("Unexpected signup response: {}", e))
    };

    if body.get("access_token").is_some() {
        let session = serde_json::from_value::<TokenResponse>(body)
            .map_err(unexpected)?
            .into_session();
        return Ok((session.identity.clone(), Some(session)));
    }

    let user: GoTrueUser = serde_json::from_value(body).map_err(unexpected)?;
    if user.identities.as_ref().is_some_and(Vec::is_empty) {
        return Err(ProviderError::EmailInUse);
    }
    Ok((user.into_identity(), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::new();
        config.supabase_url = "https://test.supabase.co/".to_string();
        config.supabase_anon_key = "anon".to_string();
        config.web_app_url = "https://marquee.test".to_string();
        config.federated_provider = "google".to_string();
        config
    }

    #[test]
    fn test_auth_url() {
        let provider = SupabaseCredentialProvider::new(&config());
        assert_eq!(
            provider.auth_url("token?grant_type=password"),
            "https://test.supabase.co/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn test_signup_with_session_is_signed_in() {
        let body = serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": {
                "id": "u-1",
                "email": "ada@example.com",
                "email_confirmed_at": "2024-01-01T00:00:00Z",
                "identities": [{"provider": "email"}]
            }
        });

        let (identity, session) = classify_signup(body).unwrap();
        let session = session.expect("session");
        assert_eq!(identity.id, "u-1");
        assert!(identity.email_verified);
        assert_eq!(session.access_token, "at");
        assert_eq!(session.identity, identity);
    }

    #[test]
    fn test_signup_bare_user_has_no_session() {
        let body = serde_json::json!({
            "id": "u-2",
            "email": "ada@example.com",
            "identities": [{"provider": "email"}]
        });

        let (identity, session) = classify_signup(body).unwrap();
        assert_eq!(identity.id, "u-2");
        assert_eq!(identity.email, "ada@example.com");
        assert!(!identity.email_verified);
        assert!(session.is_none());
    }

    #[test]
    fn test_signup_without_identities_is_email_in_use() {
        let body = serde_json::json!({
            "id": "u-3",
            "email": "ada@example.com",
            "identities": []
        });

        assert!(matches!(
            classify_signup(body),
            Err(ProviderError::EmailInUse)
        ));
    }

    #[test]
    fn test_signup_garbage_is_other() {
        let body = serde_json::json!({"access_token": "at"});

        assert!(matches!(classify_signup(body), Err(ProviderError::Other(_))));
    }

    #[test]
    fn test_start_federated_login() {
        let provider = SupabaseCredentialProvider::new(&config());
        let start = provider.start_federated_login();

        assert!(Uuid::parse_str(&start.login_id).is_ok());
        assert_eq!(
            start.login_url,
            format!(
                "https://marquee.test/auth/federated?login_id={}&provider=google",
                start.login_id
            )
        );
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_ok() {
        let provider = SupabaseCredentialProvider::new(&config());
        let sessions = provider.observe_session_changes();

        provider.sign_out().await.unwrap();

        assert_eq!(*sessions.borrow(), None);
        assert!(provider.shared_session().get().is_none());
    }

    #[tokio::test]
    async fn test_update_display_name_needs_session() {
        let provider = SupabaseCredentialProvider::new(&config());
        let identity = Identity {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            email_verified: false,
            display_name: None,
            photo_url: None,
        };

        assert_eq!(
            provider.update_display_name(&identity, "Ada").await,
            Err(ProviderError::NoSession)
        );
    }
}
