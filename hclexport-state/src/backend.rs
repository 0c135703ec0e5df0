//! State backend trait and error types

use async_trait::async_trait;
use thiserror::Error;

use crate::state::StateFile;

/// Errors that can occur when interacting with a state backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// State file is corrupted or invalid
    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// State file written by an unsupported format version
    #[error("Unsupported state version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for state files
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state
    ///
    /// Returns `None` if no state exists yet
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;
}
