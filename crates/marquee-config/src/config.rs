//! Configuration management for Marquee.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://marquee.supabase.co",
};

/// Default Supabase anon key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default web app URL used for the federated sign-in hand-off.
pub const DEFAULT_WEB_APP_URL: &str = match option_env!("MARQUEE_WEB_APP_URL") {
    Some(url) => url,
    None => "https://marquee.watch",
};

/// Default federated identity provider.
pub const DEFAULT_FEDERATED_PROVIDER: &str = "google";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_PROFILES_TABLE: &str = "profiles";
const DEFAULT_BOOKMARKS_TABLE: &str = "bookmarks";

/// Main Marquee configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to expose).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Web app base URL hosting the federated sign-in page.
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
    /// Federated provider name passed to the web app (e.g. "google").
    #[serde(default = "default_federated_provider")]
    pub federated_provider: String,
    /// PostgREST table holding one profile row per identity.
    #[serde(default = "default_profiles_table")]
    pub profiles_table: String,
    /// PostgREST table holding bookmark rows.
    #[serde(default = "default_bookmarks_table")]
    pub bookmarks_table: String,
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

fn default_federated_provider() -> String {
    DEFAULT_FEDERATED_PROVIDER.to_string()
}

fn default_profiles_table() -> String {
    DEFAULT_PROFILES_TABLE.to_string()
}

fn default_bookmarks_table() -> String {
    DEFAULT_BOOKMARKS_TABLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            web_app_url: default_web_app_url(),
            federated_provider: default_federated_provider(),
            profiles_table: default_profiles_table(),
            bookmarks_table: default_bookmarks_table(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| CoreError::MalformedConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `MARQUEE_*` overrides from the given lookup. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = non_empty("MARQUEE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty("MARQUEE_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = non_empty("MARQUEE_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
        if let Some(url) = non_empty("MARQUEE_WEB_APP_URL") {
            self.web_app_url = url;
        }
    }

    /// Check that URLs parse and the anon key is present.
    pub fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        Url::parse(&self.web_app_url).map_err(|source| CoreError::InvalidUrl {
            setting: "web_app_url",
            source,
        })?;
        if self.supabase_anon_key.trim().is_empty() {
            return Err(CoreError::MissingSetting {
                setting: "supabase_anon_key",
                env_var: "MARQUEE_SUPABASE_ANON_KEY",
            });
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(|source| CoreError::InvalidUrl {
            setting: "supabase_url",
            source,
        })
    }

    /// Supabase URL without a trailing slash, ready for path joins.
    pub fn supabase_base(&self) -> String {
        self.supabase_url.trim_end_matches('/').to_string()
    }

    /// Web app URL without a trailing slash, ready for path joins.
    pub fn web_app_base(&self) -> String {
        self.web_app_url.trim_end_matches('/').to_string()
    }
}
