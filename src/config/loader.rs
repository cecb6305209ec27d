//! File loading and merging for llm-adapter configuration.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::{Config, DiscoveryConfig, ProviderConfig, SecretsConfig};
use crate::constants::{DEFAULT_API_BASE, DEFAULT_LOG_LEVEL, DEFAULT_TIMEOUT_SECS, PROJECT_CONFIG_FILENAME};

impl Config {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if `contents` is not valid configuration TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    /// Loads the global config from `~/.config/llm-adapter/config.toml`,
    /// writing a default file first if none exists.
    pub(super) fn load_global() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = format!(
                r#"log_level = "{DEFAULT_LOG_LEVEL}"

[provider]
api_base = "{DEFAULT_API_BASE}"
timeout_secs = {DEFAULT_TIMEOUT_SECS}

[discovery]
keep_partial = true

[secrets]
# path = "{{env:LLM_ADAPTER_SECRETS}}"
"#
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            return Self::from_toml_str(&default_toml);
        }
        Self::load_file(&path)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config at {:?}", path))
    }

    /// Looks for `llm-adapter.toml` in `start`, then walks up to the git root.
    pub(super) fn load_project(start: &Path) -> Result<Option<Self>> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(PROJECT_CONFIG_FILENAME);
            if candidate.exists() {
                return Self::load_file(&candidate).map(Some);
            }
            if dir.join(".git").exists() || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Merges project config over global config. Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        Config {
            log_level: project.log_level.or(global.log_level),
            provider: ProviderConfig {
                api_base: project.provider.api_base.or(global.provider.api_base),
                timeout_secs: project.provider.timeout_secs.or(global.provider.timeout_secs),
            },
            discovery: DiscoveryConfig {
                keep_partial: project.discovery.keep_partial.or(global.discovery.keep_partial),
            },
            secrets: SecretsConfig {
                path: project.secrets.path.or(global.secrets.path),
            },
        }
    }
}
