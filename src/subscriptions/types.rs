//! Change feed types.

use crate::types::EntityKind;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before the subscriber is dropped.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: ChangeFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: ChangeFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct ChangeFilter {
    /// Entity kinds of interest (None = all kinds).
    pub kinds: Option<Vec<EntityKind>>,

    /// Include entity change/delete events.
    pub include_entities: bool,

    /// Include comment append events.
    pub include_comments: bool,

    /// Include sweep events.
    pub include_lifecycle: bool,
}

impl ChangeFilter {
    /// Everything.
    pub fn all() -> Self {
        Self {
            kinds: None,
            include_entities: true,
            include_comments: true,
            include_lifecycle: true,
        }
    }

    /// Entity events for the given kinds only.
    pub fn kinds(kinds: Vec<EntityKind>) -> Self {
        Self {
            kinds: Some(kinds),
            include_entities: true,
            ..Default::default()
        }
    }

    /// Comment appends only.
    pub fn comments() -> Self {
        Self {
            include_comments: true,
            ..Default::default()
        }
    }

    /// Sweep events only.
    pub fn lifecycle() -> Self {
        Self {
            include_lifecycle: true,
            ..Default::default()
        }
    }

    pub(crate) fn matches(&self, event: &ChangeEvent) -> bool {
        match event {
            ChangeEvent::EntityChanged { kind, .. } | ChangeEvent::EntityDeleted { kind, .. } => {
                self.include_entities
                    && self.kinds.as_ref().map_or(true, |kinds| kinds.contains(kind))
            }
            ChangeEvent::CommentAdded { .. } => self.include_comments,
            ChangeEvent::SweepCompleted { .. } => self.include_lifecycle,
            ChangeEvent::Dropped { .. } => true,
        }
    }
}

/// Events emitted by the workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// An entity was created or updated.
    EntityChanged { kind: EntityKind, id: String },

    /// An entity was deleted (cascaded deletions emit their own events).
    EntityDeleted { kind: EntityKind, id: String },

    /// A comment was appended to a task.
    CommentAdded { task_id: String, sequence: u64 },

    /// An orphan sweep finished.
    SweepCompleted { removed: usize },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ChangeEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ChangeEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ChangeEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// All events currently buffered.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}
