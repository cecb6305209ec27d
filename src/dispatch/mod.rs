//! Prediction dispatch.
//!
//! Given settings and a prompt, [`Dispatcher`] looks up the model's
//! capabilities, picks an invocation mode from an ordered preference list,
//! resolves credentials, calls the provider, and folds the outcome into a
//! [`ResultEnvelope`]. No failure on this path escapes as an `Err` or panic:
//! every entry point returns an envelope.

mod envelope;
mod request;

pub use envelope::ResultEnvelope;
pub use request::{chat_body, embedding_body, prepare_request, text_body, PromptStruct};

use serde_json::Value;
use std::sync::Arc;

use crate::error::AdapterError;
use crate::models::{Capability, ModelDescriptor};
use crate::provider::{Connection, ProviderClient, ProviderError};
use crate::registry::CapabilityRegistry;
use crate::secrets::{CredentialResolver, ProjectId};
use crate::settings::IntegrationSettings;
use crate::tokens::{check_context_usage, count_tokens, format_token_usage, ContextStatus};

/// Which provider call serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    Chat,
    Text,
}

impl InvocationMode {
    /// The capability a model must declare for this mode.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Chat => Capability::ChatCompletion,
            Self::Text => Capability::Completion,
        }
    }
}

/// Default mode precedence: chat is the more capable superset, so it wins
/// whenever a model declares both.
pub const MODE_PREFERENCE: [InvocationMode; 2] = [InvocationMode::Chat, InvocationMode::Text];

/// First mode in `preference` the descriptor supports.
pub fn select_mode(descriptor: &ModelDescriptor, preference: &[InvocationMode]) -> Option<InvocationMode> {
    preference
        .iter()
        .copied()
        .find(|mode| descriptor.capabilities.contains(mode.capability()))
}

/// Routes requests to the right provider call and normalizes the result.
///
/// Holds only shared read-only state, so one instance serves concurrent
/// requests without locking.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    client: Arc<dyn ProviderClient>,
    resolver: Arc<dyn CredentialResolver>,
    preference: Vec<InvocationMode>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        client: Arc<dyn ProviderClient>,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            registry,
            client,
            resolver,
            preference: MODE_PREFERENCE.to_vec(),
        }
    }

    /// Overrides the mode precedence.
    pub fn with_preference(mut self, preference: Vec<InvocationMode>) -> Self {
        self.preference = preference;
        self
    }

    /// Predicts with whichever mode the configured model supports.
    pub async fn predict(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        prompt: &PromptStruct,
    ) -> ResultEnvelope {
        let result = self.try_predict(project_id, settings, prompt).await;
        self.normalize(&settings.model_name, result)
    }

    /// Sends a caller-built chat request.
    pub async fn chat_completion(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        request: Value,
    ) -> ResultEnvelope {
        let result = self
            .invoke_request(InvocationMode::Chat, project_id, settings, request)
            .await;
        self.normalize(&settings.model_name, result)
    }

    /// Sends a caller-built text completion request.
    pub async fn completion(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        request: Value,
    ) -> ResultEnvelope {
        let result = self
            .invoke_request(InvocationMode::Text, project_id, settings, request)
            .await;
        self.normalize(&settings.model_name, result)
    }

    /// Embeds each of `texts`. The provider response is returned unmodified.
    pub async fn embed_documents(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        texts: &[String],
    ) -> ResultEnvelope {
        let input = Value::from(texts.to_vec());
        let result = self.try_embed(project_id, settings, input).await;
        self.normalize(&settings.model_name, result)
    }

    /// Embeds a single query and returns just its vector.
    pub async fn embed_query(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        text: &str,
    ) -> ResultEnvelope {
        let result = self
            .try_embed(project_id, settings, Value::from(text))
            .await
            .and_then(|response| first_embedding(response).map_err(AdapterError::from));
        self.normalize(&settings.model_name, result)
    }

    async fn try_embed(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        input: Value,
    ) -> Result<Value, AdapterError> {
        let model = settings.model_name.as_str();
        let descriptor = self.registry.lookup(model, settings);
        if !descriptor.capabilities.contains(Capability::Embeddings) {
            return Err(AdapterError::UnsupportedModel {
                model: model.to_string(),
                operation: "embeddings",
            });
        }
        tracing::info!(model, project_id, "dispatching embeddings");
        let conn = self.connect(project_id, settings)?;
        let body = embedding_body(settings, input);
        Ok(self.client.embeddings(&conn, body).await?)
    }

    async fn try_predict(
        &self,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        prompt: &PromptStruct,
    ) -> Result<Value, AdapterError> {
        let model = settings.model_name.as_str();
        let descriptor = self.registry.lookup(model, settings);
        let Some(mode) = select_mode(&descriptor, &self.preference) else {
            return Err(AdapterError::UnsupportedModel {
                model: model.to_string(),
                operation: "chat or text completion",
            });
        };
        tracing::info!(model, ?mode, project_id, "dispatching prediction");
        warn_on_context_usage(&descriptor, prompt);

        let body = match mode {
            InvocationMode::Chat => chat_body(settings, prompt),
            InvocationMode::Text => text_body(settings, prompt),
        };
        self.invoke(mode, project_id, settings, body).await
    }

    async fn invoke_request(
        &self,
        mode: InvocationMode,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        request: Value,
    ) -> Result<Value, AdapterError> {
        let body = prepare_request(settings, request)?;
        tracing::info!(model = %settings.model_name, ?mode, project_id, "dispatching prebuilt request");
        self.invoke(mode, project_id, settings, body).await
    }

    /// Resolves the credential for this request only.
    fn connect(&self, project_id: ProjectId, settings: &IntegrationSettings) -> Result<Connection, AdapterError> {
        let api_key = self.resolver.resolve(&settings.api_token, project_id)?;
        Ok(settings.connection(api_key))
    }

    async fn invoke(
        &self,
        mode: InvocationMode,
        project_id: ProjectId,
        settings: &IntegrationSettings,
        body: Value,
    ) -> Result<Value, AdapterError> {
        let conn = self.connect(project_id, settings)?;
        let response = match mode {
            InvocationMode::Chat => self.client.chat_completion(&conn, body).await?,
            InvocationMode::Text => self.client.completion(&conn, body).await?,
        };
        Ok(response)
    }

    fn normalize(&self, model: &str, result: Result<Value, AdapterError>) -> ResultEnvelope {
        match result {
            Ok(response) => ResultEnvelope::Ok(response),
            Err(err) => {
                tracing::error!(model, kind = err.kind(), error = ?err, "prediction failed");
                ResultEnvelope::Err(err.summary())
            }
        }
    }
}

/// `data[0].embedding` of an embeddings response.
fn first_embedding(mut response: Value) -> Result<Value, ProviderError> {
    match response.pointer_mut("/data/0/embedding").map(Value::take) {
        Some(vector @ Value::Array(_)) => Ok(vector),
        _ => Err(ProviderError::Decode(
            "embeddings response has no `data[0].embedding` vector".into(),
        )),
    }
}

/// Logs when the prompt nears or exceeds the model's context window.
/// Tokenizing only happens when warnings would be emitted.
fn warn_on_context_usage(descriptor: &ModelDescriptor, prompt: &PromptStruct) {
    let Some(limit) = descriptor.token_limit else {
        return;
    };
    if !tracing::enabled!(tracing::Level::WARN) {
        return;
    }
    let used = match count_tokens(&prompt.token_text(), &descriptor.id) {
        Ok(n) => n,
        Err(err) => {
            tracing::debug!(error = %err, "token count unavailable");
            return;
        }
    };
    match check_context_usage(used, Some(limit)) {
        ContextStatus::Exceeded { used, limit } => {
            let usage = format_token_usage(used, Some(limit));
            tracing::warn!(model = %descriptor.id, %usage, "prompt exceeds model context window");
        }
        ContextStatus::Warning { used, limit, percent } => {
            let usage = format_token_usage(used, Some(limit));
            tracing::warn!(model = %descriptor.id, %usage, percent, "prompt is close to model context window");
        }
        ContextStatus::Ok => {}
    }
}

#[cfg(test)]
mod tests;
