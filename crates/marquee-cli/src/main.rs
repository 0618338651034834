//! Marquee CLI - sign in to the movie app and manage bookmarks.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use marquee_auth::{Gender, MediaType};
use marquee_config::{init_logging, Config, Paths};
use tracing::debug;

/// Marquee CLI - Account and bookmark management for the movie app.
#[derive(Parser)]
#[command(name = "marquee")]
#[command(about = "Marquee CLI for sign-in, sign-up and bookmarks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    SignIn {
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Sign in through the browser with the federated provider
    SignInFederated,

    /// Create an account
    SignUp {
        #[arg(short, long)]
        email: Option<String>,
        /// Name shown in the app
        #[arg(short, long)]
        display_name: Option<String>,
        /// male or female
        #[arg(short, long)]
        gender: Option<Gender>,
    },

    /// Send a password reset link
    ResetPassword {
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Resend the verification email for an unverified account
    ResendVerification {
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Manage bookmarks
    Bookmarks {
        /// Account email
        #[arg(short, long, global = true)]
        email: Option<String>,

        #[command(subcommand)]
        command: BookmarkCommands,
    },
}

#[derive(Subcommand)]
enum BookmarkCommands {
    /// List bookmarks
    List,
    /// Bookmark a title
    Add {
        media_type: MediaKind,
        media_id: u64,
        title: String,
        /// Poster image path
        #[arg(long)]
        poster_path: Option<String>,
    },
    /// Remove a bookmark
    Remove { media_type: MediaKind, media_id: u64 },
    /// Add the title if absent, remove it if present
    Toggle {
        media_type: MediaKind,
        media_id: u64,
        title: String,
    },
}

/// Media type as typed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MediaKind {
    Movie,
    Tv,
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Movie => MediaType::Movie,
            MediaKind::Tv => MediaType::Tv,
        }
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let format = &cli.format;
    match cli.command {
        Commands::SignIn { email } => commands::sign_in(&config, email, format).await,
        Commands::SignInFederated => commands::sign_in_federated(&config, format).await,
        Commands::SignUp {
            email,
            display_name,
            gender,
        } => commands::sign_up(&config, email, display_name, gender, format).await,
        Commands::ResetPassword { email } => commands::reset_password(&config, email, format).await,
        Commands::ResendVerification { email } => {
            commands::resend_verification(&config, email, format).await
        }
        Commands::Bookmarks { email, command } => match command {
            BookmarkCommands::List => commands::bookmarks_list(&config, email, format).await,
            BookmarkCommands::Add {
                media_type,
                media_id,
                title,
                poster_path,
            } => {
                commands::bookmarks_add(
                    &config,
                    email,
                    media_type.into(),
                    media_id,
                    &title,
                    poster_path,
                    format,
                )
                .await
            }
            BookmarkCommands::Remove {
                media_type,
                media_id,
            } => commands::bookmarks_remove(&config, email, media_type.into(), media_id, format).await,
            BookmarkCommands::Toggle {
                media_type,
                media_id,
                title,
            } => {
                commands::bookmarks_toggle(&config, email, media_type.into(), media_id, &title, format)
                    .await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Paths::new().and_then(|paths| Config::load(&paths)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level);
    debug!(supabase_url = %config.supabase_url, "Configuration loaded");

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
