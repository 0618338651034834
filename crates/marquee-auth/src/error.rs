//! Authentication error types.

use thiserror::Error;

/// Form input rejected before any collaborator is called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    #[error("Password must contain an uppercase letter")]
    PasswordMissingUppercase,

    #[error("Password must contain a lowercase letter")]
    PasswordMissingLowercase,

    #[error("Password must contain a number")]
    PasswordMissingDigit,

    #[error("Password must contain a symbol")]
    PasswordMissingSymbol,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Please enter a password")]
    MissingPassword,

    #[error("Please enter a display name")]
    MissingDisplayName,

    #[error("Please select a gender")]
    MissingGender,
}

/// Failure reported by the credential provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No account exists for the email.
    #[error("No account found for this email")]
    NoAccount,

    /// Password (or other credential) rejected.
    #[error("Incorrect email or password")]
    BadCredential,

    /// Sign-up for an email that already has an account.
    #[error("This email is already registered")]
    EmailInUse,

    /// Credentials are valid but the provider refuses to open a session
    /// until the email is confirmed.
    #[error("Email address has not been verified")]
    EmailNotVerified,

    /// Provider-side password policy rejected the password.
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// User dismissed or the provider aborted a federated sign-in.
    #[error("Federated sign-in cancelled: {0}")]
    FederatedCancelled(String),

    /// Operation requires an active provider session.
    #[error("No active session")]
    NoSession,

    /// Transient network or server failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Anything else, message as reported by the provider.
    #[error("{0}")]
    Other(String),
}

/// Failure reported by the profile store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Write or read refused by access rules (expected while unverified).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Transient network or server failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Error returned by [`crate::AuthFlow`] operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Form validation failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Credential provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Profile store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Another operation on this surface is still outstanding.
    #[error("Another request is already in progress")]
    Busy,

    /// The operation needs a verified, signed-in identity.
    #[error("You need to sign in first")]
    NotSignedIn,

    /// Nothing is pending verification.
    #[error("There is no account waiting for verification")]
    NothingPending,

    /// Invalid state transition in the auth FSM.
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Provider(ProviderError::Network(_) | ProviderError::Timeout) => true,
            AuthError::Store(StoreError::Network(_)) => true,
            AuthError::Busy => true,
            _ => false,
        }
    }

    /// Message for the inline form error, stripped of provider prefixes.
    pub fn user_message(&self) -> String {
        strip_provider_prefix(&self.to_string())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

const PROVIDER_PREFIXES: [&str; 5] = [
    "Firebase:",
    "FirebaseError:",
    "AuthApiError:",
    "AuthError:",
    "Supabase:",
];

/// Strip provider-specific decoration from a message before display.
///
/// Removes a leading vendor prefix (`Firebase: `, `AuthApiError: `, ...) and a
/// trailing provider error code such as ` (auth/wrong-password).`.
pub fn strip_provider_prefix(message: &str) -> String {
    let mut text = message.trim();

    loop {
        let before = text;
        for prefix in PROVIDER_PREFIXES {
            if let Some(rest) = text.strip_prefix(prefix) {
                text = rest.trim_start();
            }
        }
        if text == before {
            break;
        }
    }

    let mut text = text.to_string();
    if let Some(start) = text.rfind(" (auth/") {
        if text[start..].trim_end_matches('.').ends_with(')') {
            text.truncate(start);
        }
    }

    let text = text.trim().trim_end_matches('.').trim().to_string();
    if text.is_empty() {
        "Something went wrong".to_string()
    } else {
        text
    }
}
