//! Error taxonomy for the dispatch core.
//!
//! Every failure a request can hit maps to one [`AdapterError`] variant.
//! Envelope error strings carry a type tag (`"TransportError: ..."`,
//! `"UnsupportedModelError: ..."`) so hosts get a stable prefix to match on.

use thiserror::Error;

use crate::provider::ProviderError;
use crate::secrets::ResolutionError;
use crate::settings::ValidationErrorDetail;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Settings are malformed or incomplete.
    #[error("{0}")]
    Validation(#[from] ValidationErrorDetail),

    /// The credential reference could not be dereferenced.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// The model lacks every mode the request could use. `operation`
    /// names those modes (`"chat or text completion"`, `"embeddings"`).
    #[error("Model {model} does not support {operation}")]
    UnsupportedModel {
        model: String,
        operation: &'static str,
    },

    /// The provider call itself failed.
    #[error("{0}")]
    ProviderInvocation(#[from] ProviderError),
}

impl AdapterError {
    /// Stable type name used as the envelope error prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Resolution(_) => "ResolutionError",
            Self::UnsupportedModel { .. } => "UnsupportedModelError",
            Self::ProviderInvocation(_) => "ProviderInvocationError",
        }
    }

    /// Most specific type name: the provider failure kind for invocation
    /// errors, the taxonomy name otherwise.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ProviderInvocation(e) => e.kind(),
            other => other.kind(),
        }
    }

    /// Human-readable summary handed back to callers: `"<Type>: <message>"`.
    ///
    /// The message is followed by each underlying cause not already part of
    /// it, so a transport failure reads e.g. `"... : tcp connect error:
    /// Connection refused (os error 111)"`.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.type_name(), with_causes(self))
    }
}

/// `err`'s message joined with its `source()` chain by `": "`, skipping
/// causes whose text the message already contains.
fn with_causes(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
