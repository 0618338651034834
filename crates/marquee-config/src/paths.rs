//! File system paths for Marquee.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for Marquee.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for local files (~/.marquee)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.marquee`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir().ok_or(CoreError::NoHomeDir)?;

        Ok(Self {
            base_dir: home.join(".marquee"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.marquee).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.marquee/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}
