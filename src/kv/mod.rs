//! Durable key-value storage.
//!
//! Backends implement [`KvBackend`] and report failures as [`KvError`].
//! The workspace never talks to a backend directly: every access goes
//! through [`PersistentStore`], which turns failures into logged failure
//! values so callers can fall back to memory-only behavior.

mod adapter;
mod backend;
mod file;

pub use adapter::PersistentStore;
pub use backend::{KvBackend, MemoryBackend};
pub use file::{FileBackend, FileBackendConfig};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, crate::error::KvError>;
