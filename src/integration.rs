//! Host-facing integration surface.
//!
//! [`Integration`] bundles the registry, dispatcher, and discovery behind
//! the operations a host registers as callbacks. Every operation takes the
//! host's untyped JSON and answers with a plain value or a
//! [`ResultEnvelope`]; none of them return `Err` or panic on bad input.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::constants::INTEGRATION_NAME;
use crate::dispatch::{Dispatcher, PromptStruct, ResultEnvelope};
use crate::models::ModelDescriptor;
use crate::provider::{self, Connection, DiscoveryPolicy, ProviderClient};
use crate::registry::{self, CapabilityRegistry};
use crate::secrets::{CredentialReference, CredentialResolver, ProjectId, SecretStore, SecretStoreError};
use crate::settings::{self, IntegrationSettings, ValidationErrorDetail};
use crate::tokens;

/// Connection fields read from `set_models` payload settings. Lenient on
/// purpose: a refresh should work from a half-filled settings form.
#[derive(Debug, Default, Deserialize)]
struct ConnectionFields {
    #[serde(default)]
    api_token: Option<CredentialReference>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    api_type: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    organization: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetModelsPayload {
    #[serde(default)]
    settings: ConnectionFields,
    #[serde(default)]
    project_id: Option<ProjectId>,
}

/// The activated integration.
pub struct Integration {
    dispatcher: Dispatcher,
    registry: Arc<CapabilityRegistry>,
    client: Arc<dyn ProviderClient>,
    resolver: Arc<dyn CredentialResolver>,
    discovery: DiscoveryPolicy,
}

impl Integration {
    /// Activates the integration: seeds the default capability tables into
    /// `store` if they are missing, then loads the registry from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret store cannot be read or written.
    pub fn activate(
        store: &dyn SecretStore,
        client: Arc<dyn ProviderClient>,
        resolver: Arc<dyn CredentialResolver>,
        discovery: DiscoveryPolicy,
    ) -> Result<Self, SecretStoreError> {
        tracing::info!(integration = INTEGRATION_NAME, "activating integration");
        registry::bootstrap(store)?;
        let registry = Arc::new(CapabilityRegistry::from_store(store)?);
        tracing::debug!(models = registry.len(), "capability registry loaded");
        Ok(Self::with_registry(registry, client, resolver, discovery))
    }

    /// Builds an integration around an already loaded registry.
    pub fn with_registry(
        registry: Arc<CapabilityRegistry>,
        client: Arc<dyn ProviderClient>,
        resolver: Arc<dyn CredentialResolver>,
        discovery: DiscoveryPolicy,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone(), client.clone(), resolver.clone());
        Self {
            dispatcher,
            registry,
            client,
            resolver,
            discovery,
        }
    }

    /// Callback names a host registers this integration under.
    pub fn rpc_names() -> [String; 5] {
        [
            format!("{INTEGRATION_NAME}__predict"),
            format!("{INTEGRATION_NAME}__chat_completion"),
            format!("{INTEGRATION_NAME}__completion"),
            format!("{INTEGRATION_NAME}__parse_settings"),
            format!("{INTEGRATION_NAME}_set_models"),
        ]
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Validates a settings mapping, reporting every invalid field.
    pub fn check_settings(&self, raw: &Value) -> ResultEnvelope<IntegrationSettings, ValidationErrorDetail> {
        settings::parse(raw).into()
    }

    /// Lists the provider's models with an already resolved key.
    pub async fn get_models(
        &self,
        api_key: &str,
        api_base: Option<&str>,
        api_type: Option<&str>,
        api_version: Option<&str>,
    ) -> Vec<ModelDescriptor> {
        let conn = Connection {
            api_key: api_key.to_string(),
            api_base: api_base.map(String::from),
            api_type: api_type.map(String::from),
            api_version: api_version.map(String::from),
            organization: None,
        };
        provider::list_models(self.client.as_ref(), &conn, &self.registry, self.discovery).await
    }

    /// Counts `text` tokens with the tokenizer for `model_id`.
    pub fn count_tokens(&self, model_id: &str, text: &str) -> ResultEnvelope<usize> {
        match tokens::count_tokens(text, model_id) {
            Ok(n) => ResultEnvelope::Ok(n),
            Err(err) => {
                tracing::error!(error = ?err, "token counting failed");
                ResultEnvelope::Err(format!("TokenizerError: {err}"))
            }
        }
    }

    pub async fn predict(&self, project_id: ProjectId, settings: &Value, prompt: PromptStruct) -> ResultEnvelope {
        match self.parse_for_request(settings) {
            Ok(s) => self.dispatcher.predict(project_id, &s, &prompt).await,
            Err(envelope) => envelope,
        }
    }

    pub async fn chat_completion(&self, project_id: ProjectId, settings: &Value, request: Value) -> ResultEnvelope {
        match self.parse_for_request(settings) {
            Ok(s) => self.dispatcher.chat_completion(project_id, &s, request).await,
            Err(envelope) => envelope,
        }
    }

    pub async fn completion(&self, project_id: ProjectId, settings: &Value, request: Value) -> ResultEnvelope {
        match self.parse_for_request(settings) {
            Ok(s) => self.dispatcher.completion(project_id, &s, request).await,
            Err(envelope) => envelope,
        }
    }

    pub async fn embed_documents(&self, project_id: ProjectId, settings: &Value, texts: &[String]) -> ResultEnvelope {
        match self.parse_for_request(settings) {
            Ok(s) => self.dispatcher.embed_documents(project_id, &s, texts).await,
            Err(envelope) => envelope,
        }
    }

    pub async fn embed_query(&self, project_id: ProjectId, settings: &Value, text: &str) -> ResultEnvelope {
        match self.parse_for_request(settings) {
            Ok(s) => self.dispatcher.embed_query(project_id, &s, text).await,
            Err(envelope) => envelope,
        }
    }

    /// Operator-triggered discovery refresh.
    ///
    /// Resolves the payload's credential for its project and lists models.
    /// Any failure, including a malformed payload or unresolvable
    /// credential, is logged and yields an empty list.
    pub async fn set_models(&self, payload: &Value) -> Vec<ModelDescriptor> {
        let payload = match SetModelsPayload::deserialize(payload) {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(error = %err, "malformed set_models payload");
                return Vec::new();
            }
        };
        let fields = payload.settings;
        let project_id = payload.project_id.unwrap_or_default();
        let reference = fields
            .api_token
            .unwrap_or_else(|| CredentialReference::literal(""));
        let api_key = match self.resolver.resolve(&reference, project_id) {
            Ok(key) => key,
            Err(err) => {
                tracing::error!(project_id, error = %err, "cannot resolve credential for model discovery");
                return Vec::new();
            }
        };
        let conn = Connection {
            api_key,
            api_base: fields.api_base,
            api_type: fields.api_type,
            api_version: fields.api_version,
            organization: fields.organization,
        };
        provider::list_models(self.client.as_ref(), &conn, &self.registry, self.discovery).await
    }

    fn parse_for_request(&self, raw: &Value) -> Result<IntegrationSettings, ResultEnvelope> {
        settings::parse(raw).map_err(|detail| {
            tracing::error!(error = %detail, "rejecting request with invalid settings");
            ResultEnvelope::Err(format!("ValidationError: {detail}"))
        })
    }
}
