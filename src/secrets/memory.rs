use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{ProjectId, SecretStore, SecretStoreError, Secrets};

/// In-process secret store for embedding hosts and tests.
///
/// Counts `set_secrets` calls so callers can verify write behaviour.
#[derive(Default)]
pub struct MemorySecretStore {
    shared: RwLock<Secrets>,
    projects: RwLock<BTreeMap<ProjectId, Secrets>>,
    writes: AtomicUsize,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one project-scoped secret.
    pub fn insert_project_secret(
        &self,
        project_id: ProjectId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SecretStoreError> {
        self.projects
            .write()
            .map_err(|_| poisoned())?
            .entry(project_id)
            .or_default()
            .insert(name.into(), value.into());
        Ok(())
    }

    /// Number of `set_secrets` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn poisoned() -> SecretStoreError {
    SecretStoreError::Unavailable("secret store lock poisoned".into())
}

impl SecretStore for MemorySecretStore {
    fn get_all_secrets(&self) -> Result<Secrets, SecretStoreError> {
        Ok(self.shared.read().map_err(|_| poisoned())?.clone())
    }

    fn set_secrets(&self, secrets: Secrets) -> Result<(), SecretStoreError> {
        *self.shared.write().map_err(|_| poisoned())? = secrets;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn project_secrets(&self, project_id: ProjectId) -> Result<Secrets, SecretStoreError> {
        Ok(self
            .projects
            .read()
            .map_err(|_| poisoned())?
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }
}
