//! Provider client abstraction for llm-adapter.
//!
//! The dispatcher and discovery code talk to the provider through the
//! [`ProviderClient`] trait, keeping HTTP details in [`OpenAiClient`] and
//! letting tests substitute a scripted client.

mod client;
mod listing;

pub use client::OpenAiClient;
pub use listing::{list_models, normalize_listing, DiscoveryPolicy};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::constants::AZURE_API_TYPES;

/// Failure raised by a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network, TLS, timeout, or body decoding failure inside the HTTP client.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response arrived but did not have the expected shape.
    #[error("{0}")]
    Decode(String),

    /// The call cannot be made with this connection.
    #[error("{0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Type name used in envelope error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TransportError",
            Self::Api { .. } => "ApiError",
            Self::Decode(_) => "DecodeError",
            Self::Unsupported(_) => "UnsupportedOperationError",
        }
    }
}

/// Everything needed to reach the provider for one request.
///
/// Built per request from resolved credentials and settings; never cached.
#[derive(Clone, Default)]
pub struct Connection {
    pub api_key: String,
    pub api_base: Option<String>,
    pub api_type: Option<String>,
    pub api_version: Option<String>,
    pub organization: Option<String>,
}

impl Connection {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Whether this connection uses Azure-style `api-key` authentication.
    pub fn is_azure(&self) -> bool {
        self.api_type
            .as_deref()
            .is_some_and(|t| AZURE_API_TYPES.contains(&t.to_lowercase().as_str()))
    }

    /// The same connection with the legacy-only `api_type`/`api_version` dropped.
    pub fn without_legacy_fields(&self) -> Self {
        Self {
            api_type: None,
            api_version: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("api_type", &self.api_type)
            .field("api_version", &self.api_version)
            .field("organization", &self.organization)
            .finish()
    }
}

/// The provider calls the dispatch core depends on.
///
/// Request bodies and responses are passed through as raw JSON: the core
/// never reinterprets a provider payload.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Chat-mode invocation (`messages` in, choices out).
    async fn chat_completion(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError>;

    /// Text-mode invocation (`prompt` in, choices out).
    async fn completion(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError>;

    /// Embedding invocation (`input` in, vectors out).
    async fn embeddings(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError>;

    /// Legacy model listing. Honours `api_type`/`api_version` and only
    /// accepts the `{"data": [...]}` page shape.
    async fn list_models_legacy(&self, conn: &Connection) -> Result<Value, ProviderError>;

    /// Modern model listing. Ignores `api_type`/`api_version`.
    async fn list_models(&self, conn: &Connection) -> Result<Value, ProviderError>;
}
