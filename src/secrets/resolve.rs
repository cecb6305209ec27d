//! Credential references and their resolution.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};

use super::{ProjectId, ResolutionError, SecretStore, SecretStoreError, Secrets};

/// Matches `{{secret.NAME}}` templates, capturing `NAME`.
static SECRET_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\{\s*secret\.([A-Za-z0-9_.\-]+)\s*\}\}$").expect("secret template regex is valid")
});

/// How settings refer to an API token.
///
/// Accepts a bare string (a literal key, or a `{{secret.NAME}}` template) or
/// a `{"value": ..., "from_secrets": bool}` field where `from_secrets` marks
/// `value` as a secret name.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialReference {
    Field {
        value: String,
        #[serde(default)]
        from_secrets: bool,
    },
    Plain(String),
}

/// What a reference points at once parsed.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    Literal(&'a str),
    Secret(&'a str),
}

impl CredentialReference {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Self::Field {
            value: name.into(),
            from_secrets: true,
        }
    }

    fn target(&self) -> Target<'_> {
        let (raw, from_secrets) = match self {
            Self::Field { value, from_secrets } => (value.as_str(), *from_secrets),
            Self::Plain(value) => (value.as_str(), false),
        };
        let raw = raw.trim();
        if let Some(name) = SECRET_TEMPLATE.captures(raw).and_then(|c| c.get(1)) {
            return Target::Secret(name.as_str());
        }
        if from_secrets {
            Target::Secret(raw)
        } else {
            Target::Literal(raw)
        }
    }
}

impl fmt::Debug for CredentialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Target::Secret(name) => write!(f, "CredentialReference(secret:{name})"),
            Target::Literal(_) => f.write_str("CredentialReference(<literal>)"),
        }
    }
}

/// Turns a credential reference into secret material for one request.
///
/// Implementations must not cache results across calls: secrets rotate and
/// are scoped per project.
pub trait CredentialResolver: Send + Sync {
    fn resolve(
        &self,
        reference: &CredentialReference,
        project_id: ProjectId,
    ) -> Result<String, ResolutionError>;
}

/// Resolves secret references against a [`SecretStore`], project secrets
/// first, then shared secrets.
pub struct StoreResolver {
    store: Arc<dyn SecretStore>,
}

impl StoreResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    fn lookup(&self, name: &str, project_id: ProjectId) -> Result<Option<String>, ResolutionError> {
        let map_err = |e: SecretStoreError| match e {
            SecretStoreError::AccessDenied => ResolutionError::AccessDenied { name: name.to_string() },
            other => ResolutionError::StoreUnavailable(other.to_string()),
        };
        let project: Secrets = self.store.project_secrets(project_id).map_err(map_err)?;
        if let Some(v) = project.get(name) {
            return Ok(Some(v.clone()));
        }
        let shared = self.store.get_all_secrets().map_err(map_err)?;
        Ok(shared.get(name).cloned())
    }
}

impl CredentialResolver for StoreResolver {
    fn resolve(
        &self,
        reference: &CredentialReference,
        project_id: ProjectId,
    ) -> Result<String, ResolutionError> {
        let secret = match reference.target() {
            Target::Literal(value) => value.to_string(),
            Target::Secret(name) => self.lookup(name, project_id)?.ok_or_else(|| {
                ResolutionError::UnknownSecret {
                    name: name.to_string(),
                    project_id,
                }
            })?,
        };
        if secret.is_empty() {
            return Err(ResolutionError::Empty);
        }
        Ok(secret)
    }
}
