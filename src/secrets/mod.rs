//! Secret storage and credential resolution.
//!
//! The secret store itself is an external collaborator; this module only
//! defines the [`SecretStore`] seam, two simple implementations, and the
//! [`CredentialResolver`] that turns a settings credential reference into
//! secret material for one request.

mod file;
mod memory;
mod resolve;

pub use file::FileSecretStore;
pub use memory::MemorySecretStore;
pub use resolve::{CredentialReference, CredentialResolver, StoreResolver};

use std::collections::BTreeMap;
use thiserror::Error;

/// Identifier of the project a request is scoped to.
pub type ProjectId = u64;

/// Flat secret name -> value mapping.
pub type Secrets = BTreeMap<String, String>;

/// Failure talking to the secret store.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("secret store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("access to the secret store was denied")]
    AccessDenied,

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Failure turning a credential reference into a usable secret.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("secret '{name}' not found for project {project_id}")]
    UnknownSecret { name: String, project_id: ProjectId },

    #[error("access denied resolving secret '{name}'")]
    AccessDenied { name: String },

    #[error("secret store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("credential is empty")]
    Empty,
}

/// Process-wide secret storage with per-project scoping.
pub trait SecretStore: Send + Sync {
    /// Shared (non-project) secrets.
    fn get_all_secrets(&self) -> Result<Secrets, SecretStoreError>;

    /// Replaces the shared secrets with `secrets`.
    fn set_secrets(&self, secrets: Secrets) -> Result<(), SecretStoreError>;

    /// Secrets visible only to `project_id`.
    fn project_secrets(&self, project_id: ProjectId) -> Result<Secrets, SecretStoreError>;
}
