//! Error types for the key-value backends and the workspace.

use thiserror::Error;

/// Errors raised by a durable key-value backend.
///
/// These never cross the [`PersistentStore`](crate::kv::PersistentStore)
/// boundary; the adapter logs them and reports a failure value instead.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid entry format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Quota exceeded: limit {limit} bytes, requested {requested} bytes")]
    QuotaExceeded { limit: u64, requested: u64 },

    #[error("Store is locked by another process")]
    Locked,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

/// Errors raised by workspace lookups and mutations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Milestone not found: {0}")]
    MilestoneNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Seed error: {0}")]
    Seed(String),
}

impl From<serde_json::Error> for WorkspaceError {
    fn from(e: serde_json::Error) -> Self {
        WorkspaceError::Seed(e.to_string())
    }
}

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;
