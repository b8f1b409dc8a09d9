//! # Taskboard
//!
//! Client-side state for a project/task dashboard, with task notes and
//! comments mirrored into a durable key-value store.
//!
//! ## Core Concepts
//!
//! - **Workspace**: Canonical in-memory projects, milestones and tasks
//! - **Persistent store**: Key-value adapter that never fails to its caller
//! - **Conflict resolver**: Load-time policy choosing memory or storage per field
//! - **Comment log**: Append-only, sequence-numbered comments per task
//! - **Orphan sweeper**: Removes persisted records whose task no longer exists
//!
//! ## Example
//!
//! ```ignore
//! use taskboard::{FileBackend, FileBackendConfig, PersistentStore, Seed, TaskPatch, Workspace, WorkspaceConfig};
//!
//! let backend = FileBackend::open(FileBackendConfig {
//!     path: "./taskboard-data".into(),
//!     ..Default::default()
//! })?;
//! let workspace = Workspace::open(
//!     Seed::from_json(&seed_json)?,
//!     PersistentStore::from_backend(backend),
//!     WorkspaceConfig::default().with_author("Ada"),
//! )?;
//!
//! // Notes are written through immediately
//! workspace.update_task("t1", TaskPatch::notes("Waiting on legal"))?;
//!
//! // Comments get the next sequence number
//! workspace.add_comment("t1", "Legal signed off")?;
//!
//! // Deferred work (debounced notes, the startup sweep)
//! workspace.tick();
//! ```

pub mod clock;
pub mod comments;
pub mod error;
pub mod kv;
pub mod persist;
pub mod scheduler;
pub mod subscriptions;
pub mod sweeper;
pub mod types;
pub mod workspace;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use comments::{sorted_by_sequence, CommentLogManager};
pub use error::{KvError, Result, WorkspaceError};
pub use kv::{FileBackend, FileBackendConfig, KvBackend, MemoryBackend, PersistentStore};
pub use persist::{
    CommentsDecision, ConflictResolver, FieldKind, NotesDecision, OverrideReason, PersistedKey,
};
pub use scheduler::{Scheduler, TimerHandle};
pub use subscriptions::{
    ChangeEvent, ChangeFeed, ChangeFilter, DropReason, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};
pub use sweeper::{OrphanSweeper, SweepReport};
pub use types::*;
pub use workspace::{HydrationSummary, Workspace, WorkspaceConfig};
