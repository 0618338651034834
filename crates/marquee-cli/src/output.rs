//! Output formatting for the CLI.

use clap::ValueEnum;
use marquee_auth::{AuthStage, AuthView, Avatar, Bookmark, Identity};
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "status": "success", "message": message })
            );
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::json!({ "status": "error", "message": message })
            );
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(50));
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    print_divider();
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not encode output: {}", e),
    }
}

fn stage_label(stage: AuthStage) -> &'static str {
    match stage {
        AuthStage::SignedOut => "signed out",
        AuthStage::SignIn => "sign-in form",
        AuthStage::SignUp => "sign-up form",
        AuthStage::VerificationPending => "waiting for email verification",
        AuthStage::PasswordReset => "password reset form",
        AuthStage::ResetSent => "reset link sent",
        AuthStage::SignedIn => "signed in",
    }
}

/// Print the auth surface after an operation.
pub fn print_view(view: &AuthView, format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            print_row("State", stage_label(view.stage));
            if let Some(email) = &view.pending_email {
                print_row("Pending", email);
            }
            if let Some(email) = &view.reset_email {
                print_row("Reset sent to", email);
            }
            if let Some(notice) = &view.notice {
                println!("{}", notice);
            }
            for warning in &view.warnings {
                println!("Warning: {}", warning);
            }
        }
        OutputFormat::Json => print_json(view),
    }
}

/// Print the signed-in identity.
pub fn print_identity(identity: &Identity, avatar: Avatar, format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            print_heading("Signed in");
            print_row("User ID", &identity.id);
            print_row("Email", &identity.email);
            if let Some(name) = &identity.display_name {
                print_row("Name", name);
            }
            print_row(
                "Avatar",
                match avatar {
                    Avatar::Male => "male",
                    Avatar::Female => "female",
                    Avatar::Neutral => "neutral",
                },
            );
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "identity": identity,
            "avatar": avatar,
        })),
    }
}

/// Print a bookmark list.
pub fn print_bookmarks(bookmarks: &[Bookmark], format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            if bookmarks.is_empty() {
                println!("No bookmarks yet.");
                return;
            }
            print_heading(&format!("Bookmarks ({})", bookmarks.len()));
            for bookmark in bookmarks {
                println!(
                    "  {:<14} {}  ({})",
                    bookmark.key(),
                    bookmark.title,
                    bookmark.added_at.format("%Y-%m-%d")
                );
            }
        }
        OutputFormat::Json => print_json(&bookmarks),
    }
}
