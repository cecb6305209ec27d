//! Capability resolution and invocation dispatch for OpenAI-compatible LLM
//! integrations.
//!
//! The crate validates operator settings, resolves credentials through a
//! [`secrets::SecretStore`], discovers provider models, and routes each
//! prediction to the chat or text completion endpoint the configured model
//! supports. [`integration::Integration`] is the host-facing entry point.

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod integration;
pub mod models;
pub mod provider;
pub mod registry;
pub mod secrets;
pub mod settings;
pub mod tokens;

pub use dispatch::{PromptStruct, ResultEnvelope};
pub use error::AdapterError;
pub use integration::Integration;
pub use models::{Capability, ModelDescriptor};
