//! Struct definitions and serde defaults for llm-adapter configuration.

use serde::{Deserialize, Serialize};

/// Root configuration, deserialized from `config.toml`.
///
/// Every field is optional so the adapter runs with built-in defaults when
/// no config file exists, and so a project file only overrides what it
/// names.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset (e.g. `"info"`, `"llm_adapter=debug"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Provider connection defaults.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Model discovery behaviour.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Secret store location.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Provider endpoint and HTTP settings.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    /// Base URL used when settings leave `api_base` unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DiscoveryConfig {
    /// Keep the well-formed records of a listing that also has bad ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_partial: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SecretsConfig {
    /// Path of the JSON secret store file. Defaults to the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
