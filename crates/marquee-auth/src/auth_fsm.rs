//! Authentication surface state machine using rust-fsm.
//!
//! The machine decides which form the auth surface renders and when an
//! identity counts as signed in. Side effects live in [`crate::AuthFlow`];
//! this module only encodes which transitions are legal.
//!
//! ## State Diagram
//!
//! ```text
//!                ┌──────────────┐  OpenSurface   ┌──────────────┐
//!   (initial) ──►│  SignedOut   │ ─────────────► │    SignIn    │◄───────────┐
//!                └──────┬───────┘ ◄───────────── └──┬──┬──┬──┬──┘            │
//!                       │          CloseSurface     │  │  │  │   ReturnToSignIn
//!                       │                 NoAccount │  │  │  │ RequestPasswordReset
//!                       │            RequestSignUp  ▼  │  │  ▼               │
//!                       │               ┌──────────┐   │  │ ┌──────────────┐ │
//!                       │               │  SignUp  │   │  │ │PasswordReset │ │
//!                       │               └────┬─────┘   │  │ └──────┬───────┘ │
//!                       │     AccountCreated │         │  │        │ ResetEmailSent
//!                       │                    ▼         │  │        ▼         │
//!                       │        ┌─────────────────────┴┐ │ ┌──────────────┐ │
//!                       │        │ VerificationPending  │◄┘ │  ResetSent   │─┘
//!                       │        └──────────────────────┘   └──────────────┘
//!                       │   SignInUnverified (from SignIn / SignedOut)
//!                       │
//!                       │ SessionVerified (from any state)
//!                       ▼
//!                ┌──────────────┐
//!                │   SignedIn   │ ── SignOut / SessionLost ──► SignedOut
//!                └──────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates module `auth_surface` with State, Input, StateMachine and Impl.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_surface(SignedOut)

    SignedOut => {
        OpenSurface => SignIn,
        RequestSignUp => SignUp,
        RequestPasswordReset => PasswordReset,
        NoAccount => SignUp,
        SignInUnverified => VerificationPending,
        SessionVerified => SignedIn
    },
    SignIn => {
        CloseSurface => SignedOut,
        RequestSignUp => SignUp,
        RequestPasswordReset => PasswordReset,
        NoAccount => SignUp,
        SignInUnverified => VerificationPending,
        SessionVerified => SignedIn
    },
    SignUp => {
        CloseSurface => SignedOut,
        AccountCreated => VerificationPending,
        ReturnToSignIn => SignIn,
        SessionVerified => SignedIn
    },
    VerificationPending => {
        CloseSurface => SignedOut,
        ReturnToSignIn => SignIn,
        SessionVerified => SignedIn
    },
    PasswordReset => {
        CloseSurface => SignedOut,
        ResetEmailSent => ResetSent,
        ReturnToSignIn => SignIn,
        SessionVerified => SignedIn
    },
    ResetSent => {
        CloseSurface => SignedOut,
        ReturnToSignIn => SignIn,
        SessionVerified => SignedIn
    },
    SignedIn => {
        SessionVerified => SignedIn,
        SignOut => SignedOut,
        SessionLost => SignedOut
    }
}

pub use auth_surface::Input as AuthMachineInput;
pub use auth_surface::State as AuthMachineState;
pub use auth_surface::StateMachine as AuthMachine;

/// View-facing mirror of the machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStage {
    /// Surface closed, nobody signed in.
    SignedOut,
    /// Sign-in form.
    SignIn,
    /// Account creation form.
    SignUp,
    /// Waiting for the user to click the emailed verification link.
    VerificationPending,
    /// Password reset request form.
    PasswordReset,
    /// Reset mail sent confirmation.
    ResetSent,
    /// Verified identity signed in.
    SignedIn,
}

impl AuthStage {
    /// True only for [`AuthStage::SignedIn`].
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthStage::SignedIn)
    }

    /// True when the stage renders one of the auth forms.
    pub fn is_form(&self) -> bool {
        !matches!(self, AuthStage::SignedOut | AuthStage::SignedIn)
    }
}

impl From<&AuthMachineState> for AuthStage {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::SignedOut => AuthStage::SignedOut,
            AuthMachineState::SignIn => AuthStage::SignIn,
            AuthMachineState::SignUp => AuthStage::SignUp,
            AuthMachineState::VerificationPending => AuthStage::VerificationPending,
            AuthMachineState::PasswordReset => AuthStage::PasswordReset,
            AuthMachineState::ResetSent => AuthStage::ResetSent,
            AuthMachineState::SignedIn => AuthStage::SignedIn,
        }
    }
}

impl std::fmt::Display for AuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthStage::SignedOut => "signed_out",
            AuthStage::SignIn => "sign_in",
            AuthStage::SignUp => "sign_up",
            AuthStage::VerificationPending => "verification_pending",
            AuthStage::PasswordReset => "password_reset",
            AuthStage::ResetSent => "reset_sent",
            AuthStage::SignedIn => "signed_in",
        };
        f.write_str(name)
    }
}
