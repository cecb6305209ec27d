//! JSON-file secret store.
//!
//! Layout: `{"shared": {name: value}, "projects": {"<id>": {name: value}}}`.
//! Values are stored in plain text; encryption belongs to a real vault.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ProjectId, SecretStore, SecretStoreError, Secrets};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretFile {
    #[serde(default)]
    shared: Secrets,
    #[serde(default)]
    projects: BTreeMap<String, Secrets>,
}

/// Secret store backed by a single JSON file.
///
/// The file is re-read on every call so external edits and rotations are
/// picked up without a restart. A missing file reads as empty.
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SecretFile, SecretStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(SecretFile::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SecretFile::default()),
            Err(e) => Err(io_error(e)),
        }
    }

    fn write(&self, file: &SecretFile) -> Result<(), SecretStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, json).map_err(io_error)
    }
}

fn io_error(e: std::io::Error) -> SecretStoreError {
    if e.kind() == ErrorKind::PermissionDenied {
        SecretStoreError::AccessDenied
    } else {
        SecretStoreError::Io(e)
    }
}

impl SecretStore for FileSecretStore {
    fn get_all_secrets(&self) -> Result<Secrets, SecretStoreError> {
        Ok(self.read()?.shared)
    }

    fn set_secrets(&self, secrets: Secrets) -> Result<(), SecretStoreError> {
        let mut file = self.read()?;
        file.shared = secrets;
        self.write(&file)
    }

    fn project_secrets(&self, project_id: ProjectId) -> Result<Secrets, SecretStoreError> {
        Ok(self
            .read()?
            .projects
            .remove(&project_id.to_string())
            .unwrap_or_default())
    }
}
