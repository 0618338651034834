//! Scenario tests for the auth flow.
//!
//! - `harness.rs`        - In-memory credential provider, profile store and flow wiring
//! - `sign_in.rs`        - Password and federated sign-in, unverified routing
//! - `sign_up.rs`        - Account creation and forced sign-out
//! - `verification.rs`   - Resending verification, profile merge on first sign-in
//! - `password_reset.rs` - Reset form validation and ResetSent
//! - `surface.rs`        - Open/close, in-flight guard, stale results
//! - `observer.rs`       - Provider session observation and sign-out
//! - `bookmarks.rs`      - Gated views over the ambient identity

mod bookmarks;
pub(crate) mod harness;
mod surface;
