//! Load-time conflict policy between in-memory and persisted field values.
//!
//! Notes use last-writer-wins with a freshness window. Concurrent edits are
//! never merged; one side simply wins:
//!
//! 1. nothing persisted, or persisted equals in-memory: keep in-memory
//! 2. persisted write is younger than the window: persisted wins
//! 3. no write time recorded and persisted text is non-blank: persisted wins
//! 4. otherwise: keep in-memory
//!
//! Comments are append-only, so a non-empty persisted list is authoritative.

use crate::types::{Comment, Timestamp};
use std::time::Duration;

/// Default freshness window for persisted notes.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Why a persisted value replaced the in-memory one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideReason {
    /// Written within the freshness window.
    Fresh,
    /// No write time on record, but the content is non-trivial.
    Untimestamped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotesDecision {
    KeepInMemory,
    UsePersisted { value: String, reason: OverrideReason },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommentsDecision {
    KeepInMemory,
    UsePersisted { comments: Vec<Comment>, sequence: u64 },
}

/// Decides which side wins when hydrating a persisted field.
#[derive(Clone, Copy, Debug)]
pub struct ConflictResolver {
    freshness_window: Duration,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_WINDOW)
    }
}

impl ConflictResolver {
    pub fn new(freshness_window: Duration) -> Self {
        Self { freshness_window }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub fn resolve_notes(
        &self,
        in_memory: &str,
        persisted: Option<&str>,
        persisted_at: Option<Timestamp>,
        now: Timestamp,
    ) -> NotesDecision {
        let persisted = match persisted {
            Some(p) if p != in_memory => p,
            _ => return NotesDecision::KeepInMemory,
        };

        let reason = match persisted_at {
            Some(at) if now.millis_since(at) < self.freshness_window.as_millis() as i64 => {
                OverrideReason::Fresh
            }
            None if !persisted.trim().is_empty() => OverrideReason::Untimestamped,
            _ => return NotesDecision::KeepInMemory,
        };

        NotesDecision::UsePersisted {
            value: persisted.to_string(),
            reason,
        }
    }

    pub fn resolve_comments(&self, persisted: Option<Vec<Comment>>) -> CommentsDecision {
        match persisted {
            Some(comments) if !comments.is_empty() => {
                let sequence = comments.iter().map(|c| c.sequence).max().unwrap_or(0);
                CommentsDecision::UsePersisted { comments, sequence }
            }
            _ => CommentsDecision::KeepInMemory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 60 * 60 * 1000;
    const NOW: Timestamp = Timestamp(1_700_000_000_000);

    fn resolver() -> ConflictResolver {
        ConflictResolver::default()
    }

    #[test]
    fn test_absent_keeps_memory() {
        assert_eq!(
            resolver().resolve_notes("A", None, None, NOW),
            NotesDecision::KeepInMemory
        );
    }

    #[test]
    fn test_equal_keeps_memory() {
        assert_eq!(
            resolver().resolve_notes("A", Some("A"), Some(Timestamp(NOW.0 - HOUR)), NOW),
            NotesDecision::KeepInMemory
        );
    }

    #[test]
    fn test_fresh_persisted_wins() {
        assert_eq!(
            resolver().resolve_notes("A", Some("B"), Some(Timestamp(NOW.0 - HOUR)), NOW),
            NotesDecision::UsePersisted {
                value: "B".into(),
                reason: OverrideReason::Fresh
            }
        );
    }

    #[test]
    fn test_fresh_blank_persisted_wins() {
        // Recency alone decides inside the window
        assert_eq!(
            resolver().resolve_notes("A", Some(""), Some(Timestamp(NOW.0 - HOUR)), NOW),
            NotesDecision::UsePersisted {
                value: "".into(),
                reason: OverrideReason::Fresh
            }
        );
    }

    #[test]
    fn test_stale_persisted_loses() {
        assert_eq!(
            resolver().resolve_notes("A", Some("B"), Some(Timestamp(NOW.0 - 25 * HOUR)), NOW),
            NotesDecision::KeepInMemory
        );
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let at = Timestamp(NOW.0 - 24 * HOUR);
        assert_eq!(
            resolver().resolve_notes("A", Some("B"), Some(at), NOW),
            NotesDecision::KeepInMemory
        );
        let at = Timestamp(NOW.0 - 24 * HOUR + 1);
        assert!(matches!(
            resolver().resolve_notes("A", Some("B"), Some(at), NOW),
            NotesDecision::UsePersisted { .. }
        ));
    }

    #[test]
    fn test_untimestamped_nonblank_wins() {
        assert_eq!(
            resolver().resolve_notes("A", Some("B"), None, NOW),
            NotesDecision::UsePersisted {
                value: "B".into(),
                reason: OverrideReason::Untimestamped
            }
        );
    }

    #[test]
    fn test_untimestamped_blank_loses() {
        assert_eq!(
            resolver().resolve_notes("A", Some("   "), None, NOW),
            NotesDecision::KeepInMemory
        );
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        assert!(matches!(
            resolver().resolve_notes("A", Some("B"), Some(Timestamp(NOW.0 + HOUR)), NOW),
            NotesDecision::UsePersisted { reason: OverrideReason::Fresh, .. }
        ));
    }

    #[test]
    fn test_comments_nonempty_is_authoritative() {
        let comments = vec![
            Comment::new("a", "me", 1, NOW),
            Comment::new("b", "me", 2, NOW),
        ];
        assert_eq!(
            resolver().resolve_comments(Some(comments.clone())),
            CommentsDecision::UsePersisted { comments, sequence: 2 }
        );
    }

    #[test]
    fn test_comments_empty_or_absent_keeps_memory() {
        assert_eq!(resolver().resolve_comments(None), CommentsDecision::KeepInMemory);
        assert_eq!(resolver().resolve_comments(Some(vec![])), CommentsDecision::KeepInMemory);
    }
}
