//! Capability registry.
//!
//! Maps model ids to [`ModelDescriptor`]s. The global table is seeded from
//! the built-in defaults in [`crate::models`] and persisted to the secret
//! store on first activation so operators can edit it; per-configuration
//! model lists embedded in settings take precedence over it.

use std::collections::BTreeMap;

use crate::constants::{CAPABILITIES_MAP_KEY, TOKEN_LIMITS_KEY};
use crate::models::{Capability, ModelDescriptor, DEFAULT_CAPABILITIES, DEFAULT_TOKEN_LIMITS};
use crate::secrets::{SecretStore, SecretStoreError};
use crate::settings::IntegrationSettings;

/// Persisted capability map: mode name -> model ids.
pub type CapabilityTable = BTreeMap<String, Vec<String>>;

/// Persisted token-limit map: model id -> limit (`null` when unknown).
pub type TokenLimitTable = BTreeMap<String, Option<u32>>;

/// Returns the built-in capability map in its persisted form.
pub fn default_capability_table() -> CapabilityTable {
    DEFAULT_CAPABILITIES
        .iter()
        .map(|(cap, ids)| {
            (
                cap.as_str().to_string(),
                ids.iter().map(|id| id.to_string()).collect(),
            )
        })
        .collect()
}

/// Returns the built-in token-limit map in its persisted form.
pub fn default_token_limits() -> TokenLimitTable {
    DEFAULT_TOKEN_LIMITS
        .iter()
        .map(|(id, limit)| (id.to_string(), *limit))
        .collect()
}

/// Writes the default tables to `store` if they are missing.
///
/// Existing tables are never overwritten, even if an operator has edited
/// them. At most one `set_secrets` call is made, and none when both keys
/// already exist. Returns whether anything was written.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub fn bootstrap(store: &dyn SecretStore) -> Result<bool, SecretStoreError> {
    let mut secrets = store.get_all_secrets()?;
    let mut changed = false;

    if !secrets.contains_key(CAPABILITIES_MAP_KEY) {
        secrets.insert(
            CAPABILITIES_MAP_KEY.to_string(),
            serde_json::to_string(&default_capability_table())?,
        );
        changed = true;
    }
    if !secrets.contains_key(TOKEN_LIMITS_KEY) {
        secrets.insert(
            TOKEN_LIMITS_KEY.to_string(),
            serde_json::to_string(&default_token_limits())?,
        );
        changed = true;
    }

    if changed {
        tracing::info!("seeding default capability tables");
        store.set_secrets(secrets)?;
    }
    Ok(changed)
}

/// Global model id -> descriptor table.
///
/// Written once at activation and read-only afterwards, so it can be
/// shared across concurrent requests behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    models: BTreeMap<String, ModelDescriptor>,
}

impl CapabilityRegistry {
    /// Registry built from the compiled-in tables.
    pub fn defaults() -> Self {
        Self::from_tables(&default_capability_table(), &default_token_limits())
    }

    /// Builds a registry from the persisted table shapes.
    ///
    /// A model appears if either table mentions it. Unknown mode names are
    /// skipped; a stored limit of zero is treated as unknown.
    pub fn from_tables(capabilities: &CapabilityTable, limits: &TokenLimitTable) -> Self {
        let mut models: BTreeMap<String, ModelDescriptor> = BTreeMap::new();

        for (mode, ids) in capabilities {
            let Ok(cap) = mode.parse::<Capability>() else {
                tracing::warn!(mode = %mode, "ignoring unknown capability in stored map");
                continue;
            };
            for id in ids {
                models
                    .entry(id.clone())
                    .or_insert_with(|| ModelDescriptor::unknown(id))
                    .capabilities
                    .insert(cap);
            }
        }
        for (id, limit) in limits {
            models
                .entry(id.clone())
                .or_insert_with(|| ModelDescriptor::unknown(id))
                .token_limit = limit.filter(|&l| l > 0);
        }

        Self { models }
    }

    /// Loads the registry from the tables persisted in `store`.
    ///
    /// A missing or unparseable table falls back to its built-in default
    /// with a warning, so a bad operator edit degrades instead of breaking
    /// activation.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself cannot be read.
    pub fn from_store(store: &dyn SecretStore) -> Result<Self, SecretStoreError> {
        let secrets = store.get_all_secrets()?;
        let capabilities = secrets
            .get(CAPABILITIES_MAP_KEY)
            .and_then(|raw| parse_table(CAPABILITIES_MAP_KEY, raw))
            .unwrap_or_else(default_capability_table);
        let limits = secrets
            .get(TOKEN_LIMITS_KEY)
            .and_then(|raw| parse_table(TOKEN_LIMITS_KEY, raw))
            .unwrap_or_else(default_token_limits);
        Ok(Self::from_tables(&capabilities, &limits))
    }

    /// Global descriptor for `id`, ignoring any settings override.
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    /// Resolves the descriptor for `model_id`.
    ///
    /// Order: the settings' own model list, then the global table, then a
    /// descriptor with no capabilities. Never fails.
    pub fn lookup(&self, model_id: &str, settings: &IntegrationSettings) -> ModelDescriptor {
        if let Some(d) = settings.models.iter().find(|m| m.id == model_id) {
            return d.clone();
        }
        self.get(model_id)
            .cloned()
            .unwrap_or_else(|| ModelDescriptor::unknown(model_id))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }
}

fn parse_table<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(table) => Some(table),
        Err(err) => {
            tracing::warn!(key, error = %err, "stored table is not valid JSON, using defaults");
            None
        }
    }
}
