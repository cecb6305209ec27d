//! Struct definitions for integration settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::ModelDescriptor;
use crate::provider::Connection;
use crate::secrets::CredentialReference;

/// Provider request parameters that may ride along in settings' extra fields.
const PASSTHROUGH_PARAMS: &[&str] = &[
    "frequency_penalty",
    "presence_penalty",
    "stop",
    "n",
    "logit_bias",
    "seed",
    "user",
    "response_format",
];

/// Embedding request parameters that may ride along in settings' extra fields.
const EMBEDDING_PARAMS: &[&str] = &["dimensions", "encoding_format", "user"];

/// One provider configuration as saved by an operator.
///
/// `model_name` should match an entry in `models`; when it doesn't,
/// capability lookup falls back to the global registry and finally to "no
/// known capabilities". Fields the adapter doesn't know are kept in
/// `extra` so settings round-trip unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub model_name: String,
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    pub api_token: CredentialReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Provider-specific fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settings that have passed [`parse`](super::parse).
pub type ValidatedSettings = IntegrationSettings;

impl IntegrationSettings {
    /// Builds the per-request connection from a freshly resolved key.
    pub fn connection(&self, api_key: String) -> Connection {
        Connection {
            api_key,
            api_base: self.api_base.clone(),
            api_type: self.api_type.clone(),
            api_version: self.api_version.clone(),
            organization: self.organization.clone(),
        }
    }

    /// Sampling parameters in provider request form: the modelled ones plus
    /// any recognised request parameter found among the extra fields.
    pub fn request_params(&self) -> Map<String, Value> {
        let mut params = self.extra_params(PASSTHROUGH_PARAMS);
        if let Some(t) = self.temperature {
            params.insert("temperature".into(), t.into());
        }
        if let Some(m) = self.max_tokens {
            params.insert("max_tokens".into(), m.into());
        }
        if let Some(p) = self.top_p {
            params.insert("top_p".into(), p.into());
        }
        params
    }

    /// Embedding parameters found among the extra fields. Sampling
    /// settings do not apply to embeddings.
    pub fn embedding_params(&self) -> Map<String, Value> {
        self.extra_params(EMBEDDING_PARAMS)
    }

    fn extra_params(&self, names: &[&str]) -> Map<String, Value> {
        self.extra
            .iter()
            .filter(|(k, _)| names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
