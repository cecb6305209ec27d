//! Environment variable substitution and effective-value accessors.

use std::time::Duration;

use super::types::Config;
use crate::constants::{DEFAULT_API_BASE, DEFAULT_LOG_LEVEL, DEFAULT_TIMEOUT_SECS};
use crate::provider::DiscoveryPolicy;

impl Config {
    /// Resolves `{env:VAR_NAME}` patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self) {
        for field in [
            &mut self.log_level,
            &mut self.provider.api_base,
            &mut self.secrets.path,
        ] {
            if let Some(value) = field {
                *value = resolve_str(value);
            }
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn api_base(&self) -> &str {
        self.provider
            .api_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_API_BASE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn discovery_policy(&self) -> DiscoveryPolicy {
        DiscoveryPolicy {
            keep_partial: self.discovery.keep_partial.unwrap_or(true),
        }
    }
}

/// Replaces each `{env:VAR}` with the variable's value (empty if unset).
/// Substituted values are not scanned again.
fn resolve_str(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{env:") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 5..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}
