//! Persisted key naming.
//!
//! ```text
//! task-notes-<taskId>                 raw notes text
//! task-notes-<taskId>-timestamp       epoch millis of the last notes write
//! task-comments-<taskId>              JSON array of comments
//! task-comments-<taskId>-timestamp    epoch millis of the last comments write
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of the paired write-time key.
pub const TIMESTAMP_SUFFIX: &str = "-timestamp";

/// A task field mirrored into the durable store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Notes,
    Comments,
}

impl FieldKind {
    pub const ALL: [FieldKind; 2] = [FieldKind::Notes, FieldKind::Comments];

    pub fn prefix(self) -> &'static str {
        match self {
            FieldKind::Notes => "task-notes-",
            FieldKind::Comments => "task-comments-",
        }
    }

    pub fn value_key(self, task_id: &str) -> String {
        format!("{}{}", self.prefix(), task_id)
    }

    pub fn timestamp_key(self, task_id: &str) -> String {
        format!("{}{}{}", self.prefix(), task_id, TIMESTAMP_SUFFIX)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Notes => write!(f, "notes"),
            FieldKind::Comments => write!(f, "comments"),
        }
    }
}

/// A key recognized as belonging to this subsystem.
///
/// Task ids are opaque, so `task-notes-a-timestamp` is both the value key of
/// task `a-timestamp` and the timestamp key of task `a`. Both readings are
/// kept; a key is owned if either candidate owner exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistedKey<'a> {
    pub kind: FieldKind,
    /// Owner if this is a value key.
    pub value_owner: &'a str,
    /// Owner if this is a timestamp key.
    pub timestamp_owner: Option<&'a str>,
}

impl<'a> PersistedKey<'a> {
    /// Parse a raw key. `None` for keys outside this subsystem.
    pub fn parse(key: &'a str) -> Option<Self> {
        FieldKind::ALL.iter().find_map(|&kind| {
            key.strip_prefix(kind.prefix()).map(|rest| PersistedKey {
                kind,
                value_owner: rest,
                timestamp_owner: rest.strip_suffix(TIMESTAMP_SUFFIX),
            })
        })
    }

    /// Whether any candidate owner satisfies `is_live`.
    pub fn is_owned(&self, is_live: impl Fn(&str) -> bool) -> bool {
        is_live(self.value_owner) || self.timestamp_owner.is_some_and(is_live)
    }
}
