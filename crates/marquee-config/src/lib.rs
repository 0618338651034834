//! Configuration, paths, and logging for Marquee.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_FEDERATED_PROVIDER, DEFAULT_LOG_LEVEL, DEFAULT_SUPABASE_ANON_KEY,
    DEFAULT_SUPABASE_URL, DEFAULT_WEB_APP_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service, parse_level, LogFormat};
pub use paths::Paths;
