//! Configuration types and path resolution for llm-adapter.
//!
//! Settings live as TOML at the platform's XDG config path
//! (e.g. `~/.config/llm-adapter/config.toml` on Linux), optionally
//! overridden by an `llm-adapter.toml` in the project tree. The default
//! secret store lives under the XDG data directory.

mod loader;
mod paths;
mod resolve;
mod types;

pub use types::{Config, DiscoveryConfig, ProviderConfig, SecretsConfig};

use anyhow::Result;

impl Config {
    /// Load config with precedence: project > global > defaults.
    /// Creates the default config file if none exists.
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project(&std::env::current_dir()?)?;

        let mut config = global;
        if let Some(proj) = project {
            config = Self::merge(config, proj);
        }

        config.resolve_substitutions();
        Ok(config)
    }
}
