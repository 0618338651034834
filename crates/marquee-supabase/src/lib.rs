//! Supabase backend for Marquee authentication.
//!
//! This crate provides:
//! - `SupabaseCredentialProvider`: password, federated and email flows over Supabase Auth
//! - `SupabaseProfileStore`: profile and bookmark rows over PostgREST
//! - `SharedSession`: the in-memory session both of them use

mod errors;
mod profiles;
mod provider;
mod session;

pub use profiles::SupabaseProfileStore;
pub use provider::{FederatedLoginStart, SupabaseCredentialProvider, UrlOpener};
pub use session::{SharedSession, SupabaseSession};
