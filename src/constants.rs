//! Centralized constants for llm-adapter.
//!
//! All default strings, storage keys, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "llm-adapter";

/// Name under which the integration registers with its host.
pub const INTEGRATION_NAME: &str = "open_ai";

/// Default model identifier when settings do not name one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default base URL for the provider API.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default HTTP timeout for provider calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default log filter when neither `RUST_LOG` nor config sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "llm-adapter.toml";

/// Secret store filename under the data directory.
pub const SECRETS_FILENAME: &str = "secrets.json";

// --- Persisted registry tables ---

/// Secret store key holding the JSON capability map (mode -> model ids).
pub const CAPABILITIES_MAP_KEY: &str = "open_ai_capabilities_map";

/// Secret store key holding the JSON token-limit map (model id -> limit).
pub const TOKEN_LIMITS_KEY: &str = "open_ai_token_limits";

// --- Connection types ---

/// `api_type` values the provider family understands.
pub const KNOWN_API_TYPES: &[&str] = &["open_ai", "openai", "azure", "azure_ad"];

/// `api_type` values that use Azure-style `api-key` authentication.
pub const AZURE_API_TYPES: &[&str] = &["azure", "azure_ad"];
