//! Local file backend for state storage

use async_trait::async_trait;
use std::path::PathBuf;

use crate::backend::{BackendError, BackendResult, StateBackend};
use crate::state::StateFile;

/// State stored as a JSON file on disk
pub struct LocalBackend {
    state_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "terraform.tfstate";

    /// Backend for `terraform.tfstate` in the current directory
    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        Self { state_path }
    }

    pub fn state_path(&self) -> &PathBuf {
        &self.state_path
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        if !self.state_path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.state_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to read state file: {}", e)))?;

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;
        if state.version != StateFile::CURRENT_VERSION {
            return Err(BackendError::UnsupportedVersion {
                found: state.version,
                expected: StateFile::CURRENT_VERSION,
            });
        }

        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        if let Some(parent) = self.state_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::Io(format!("Failed to create state directory: {}", e)))?;
        }
        tokio::fs::write(&self.state_path, content)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_write() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("nested/terraform.tfstate"));

        assert!(backend.read_state().await.unwrap().is_none());

        let mut state = StateFile::new();
        state.serial = 3;
        backend.write_state(&state).await.unwrap();

        let read = backend.read_state().await.unwrap().unwrap();
        assert_eq!(read, state);
    }

    #[tokio::test]
    async fn rejects_corrupt_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("terraform.tfstate");
        std::fs::write(&path, "{not json").unwrap();

        let result = LocalBackend::with_path(path).read_state().await;
        assert!(matches!(result, Err(BackendError::InvalidState(_))));
    }

    #[tokio::test]
    async fn rejects_other_versions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("terraform.tfstate");
        std::fs::write(
            &path,
            r#"{"version": 3, "terraform_version": "0.11.0", "serial": 1, "lineage": "x"}"#,
        )
        .unwrap();

        let result = LocalBackend::with_path(path).read_state().await;
        assert!(matches!(
            result,
            Err(BackendError::UnsupportedVersion { found: 3, .. })
        ));
    }

    #[test]
    fn default_path() {
        assert_eq!(
            LocalBackend::default().state_path(),
            &PathBuf::from("terraform.tfstate")
        );
    }
}
