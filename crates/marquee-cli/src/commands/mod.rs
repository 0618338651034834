//! CLI command implementations.
//!
//! Every command runs its own in-memory session: it signs in if it needs
//! to, does its work, and signs out before exiting.

mod auth;
mod bookmarks;

pub use auth::{reset_password, resend_verification, sign_in, sign_in_federated, sign_up};
pub use bookmarks::{bookmarks_add, bookmarks_list, bookmarks_remove, bookmarks_toggle};

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use marquee_auth::{AuthFlow, AuthStage};
use marquee_config::Config;
use marquee_supabase::{SupabaseCredentialProvider, SupabaseProfileStore, UrlOpener};
use tokio::task::JoinHandle;
use tracing::debug;

/// Flow wired to the Supabase backend.
pub struct AuthContext {
    pub flow: Arc<AuthFlow>,
    pub store: Arc<SupabaseProfileStore>,
    observer: JoinHandle<()>,
}

impl AuthContext {
    pub fn new(config: &Config) -> Self {
        let opener: UrlOpener = Arc::new(|url: &str| {
            println!("Opening {} in your browser...", url);
            open::that(url)
        });
        let provider = Arc::new(SupabaseCredentialProvider::new(config).with_url_opener(opener));
        let store = Arc::new(SupabaseProfileStore::new(config, provider.shared_session()));
        let flow = Arc::new(AuthFlow::new(provider, store.clone()));
        let observer = flow.spawn_session_observer();

        Self {
            flow,
            store,
            observer,
        }
    }

    /// Sign out if signed in and stop observing the provider.
    pub async fn finish(self) {
        if self.flow.stage() == AuthStage::SignedIn {
            if let Err(e) = self.flow.sign_out().await {
                debug!(error = %e, "Sign-out on exit failed");
            }
        }
        self.observer.abort();
    }
}

/// Use `value` or prompt for it on stdin.
fn prompt_line(label: &str, value: Option<String>) -> Result<String> {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }

    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Ask user for confirmation.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
