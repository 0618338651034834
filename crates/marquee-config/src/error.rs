//! Errors raised while loading Marquee settings.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A required setting is blank after file and environment are applied.
    #[error("{setting} is not set (config.json or {env_var})")]
    MissingSetting {
        setting: &'static str,
        env_var: &'static str,
    },

    /// One of the endpoint URLs does not parse.
    #[error("{setting} is not a valid URL: {source}")]
    InvalidUrl {
        setting: &'static str,
        #[source]
        source: url::ParseError,
    },

    /// The config file exists but is not valid JSON for [`crate::Config`].
    #[error("Malformed config file {}: {source}", path.display())]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

pub type CoreResult<T> = Result<T, CoreError>;
