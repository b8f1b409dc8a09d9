//! Change feed for workspace updates.
//!
//! Views subscribe to be told when something they render may have changed:
//! - Entity creates, updates and deletes
//! - Comment appends
//! - Orphan-sweep completion
//!
//! Buffers are bounded; a subscriber that stops draining is dropped rather
//! than slowing down mutations.
//!
//! # Example
//!
//! ```ignore
//! let handle = workspace.subscribe(SubscriptionConfig {
//!     filter: ChangeFilter::kinds(vec![EntityKind::Task]),
//!     ..Default::default()
//! });
//!
//! for event in handle.drain() {
//!     if let ChangeEvent::EntityChanged { id, .. } = event {
//!         rerender(&id);
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::ChangeFeed;
pub use types::{
    ChangeEvent, ChangeFilter, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
