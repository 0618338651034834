//! Authentication for the Marquee movie discovery app.
//!
//! This crate provides:
//! - Explicit FSM-based auth surface state (sign-in, sign-up, verification, reset)
//! - The `AuthFlow` that owns the ambient verified identity
//! - Form validation (email shape, five-check password strength)
//! - Collaborator traits for the credential provider and profile store
//! - Gated views (avatar, bookmarks) that read the identity

mod auth_fsm;
mod error;
mod flow;
mod gated;
mod model;
mod provider;
mod validation;

#[cfg(test)]
mod tests;

pub use auth_fsm::auth_surface;
pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthStage};
pub use error::{
    strip_provider_prefix, AuthError, AuthResult, ProviderError, StoreError, ValidationError,
};
pub use flow::{AuthFlow, AuthView};
pub use gated::{Avatar, BookmarkChange, Bookmarks, GatedSession};
pub use model::{
    bookmark_key, Bookmark, Gender, Identity, MediaType, PendingVerification, ProfileRecord,
    ProfileUpdate, WriteMode,
};
pub use provider::{CredentialProvider, ProfileStore, WelcomeNotifier};
pub use validation::{
    validate_email, validate_sign_in, PasswordChecks, SignUpForm, ValidSignUp, MIN_PASSWORD_LEN,
};
