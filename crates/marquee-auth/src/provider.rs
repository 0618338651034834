//! Collaborator traits: credential provider, profile store, welcome notifier.
//!
//! Implementations live outside this crate (`marquee-supabase` for the hosted
//! backend, an in-memory harness for tests). [`crate::AuthFlow`] is the only
//! component that calls the credential provider's mutating operations.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{Bookmark, Identity, MediaType, ProfileRecord, ProfileUpdate, ProviderError, StoreError, WriteMode};

/// Third-party identity service.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Password sign-in. On success the provider holds a session for the
    /// returned identity, verified or not.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, ProviderError>;

    /// Federated (OAuth) sign-in.
    async fn sign_in_with_federated_provider(&self) -> Result<Identity, ProviderError>;

    /// Create a password account. Providers that sign the new account in
    /// leave a session behind; the caller is responsible for signing out.
    async fn create_account_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, ProviderError>;

    /// Set the display name on the provider-side account.
    async fn update_display_name(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<(), ProviderError>;

    /// Send (or resend) the email verification link for `email`.
    async fn send_verification_email(&self, email: &str) -> Result<(), ProviderError>;

    /// Send the password reset link for `email`.
    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError>;

    /// Drop the current session. Idempotent.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Session changes as seen by the provider (`None` = no session).
    fn observe_session_changes(&self) -> watch::Receiver<Option<Identity>>;
}

/// Per-identity document store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Write the profile record keyed by `id`.
    async fn write_profile(
        &self,
        id: &str,
        fields: &ProfileUpdate,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Read the profile record keyed by `id`.
    async fn read_profile(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError>;

    /// All bookmarks of `id`, newest first.
    async fn list_bookmarks(&self, id: &str) -> Result<Vec<Bookmark>, StoreError>;

    /// Insert or overwrite a bookmark (keyed by [`Bookmark::key`]).
    async fn put_bookmark(&self, id: &str, bookmark: &Bookmark) -> Result<(), StoreError>;

    /// Remove a bookmark. Returns whether it existed.
    async fn remove_bookmark(
        &self,
        id: &str,
        media_type: MediaType,
        media_id: u64,
    ) -> Result<bool, StoreError>;
}

/// Sends the one-off welcome email after the first verified sign-in.
#[async_trait]
pub trait WelcomeNotifier: Send + Sync {
    async fn send_welcome(&self, identity: &Identity, display_name: &str) -> Result<(), StoreError>;
}
