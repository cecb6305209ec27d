//! XDG path resolution for configuration and data directories.

use anyhow::Result;
use std::path::PathBuf;

use super::types::Config;
use crate::constants::{APP_NAME, CONFIG_FILENAME, SECRETS_FILENAME};

impl Config {
    /// Returns `~/.config/llm-adapter/` on Linux (`XDG_CONFIG_HOME/llm-adapter`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform's config directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns `~/.local/share/llm-adapter/` on Linux (`XDG_DATA_HOME/llm-adapter`).
    /// Holds the default secret store file.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform's data directory cannot be determined.
    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the full path to the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Config::config_dir`] fails.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Secret store file: `[secrets] path` when set, else the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and [`Config::data_dir`] fails.
    pub fn secrets_path(&self) -> Result<PathBuf> {
        match self.secrets.path.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(Self::data_dir()?.join(SECRETS_FILENAME)),
        }
    }
}
