//! Per-task comment log.
//!
//! Comments are journal entries: appended with the next sequence number,
//! never edited, reordered or removed. Every append rewrites the whole
//! persisted list together with a fresh write time. Persistence is best
//! effort; a failed write leaves the in-memory append in place for the
//! rest of the session.

use crate::kv::PersistentStore;
use crate::persist::{read_field, write_field, CommentsSchemaV1};
use crate::types::{Comment, Task, Timestamp};

/// Appends, persists and reloads comment lists.
#[derive(Clone, Debug)]
pub struct CommentLogManager {
    store: PersistentStore,
}

impl CommentLogManager {
    pub fn new(store: PersistentStore) -> Self {
        Self { store }
    }

    /// Append a comment to `task` and write the list through.
    ///
    /// Returns `None` without touching the task if `content` is blank.
    pub fn append(&self, task: &mut Task, content: &str, author: &str, now: Timestamp) -> Option<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let sequence = task.comments_sequence + 1;
        let comment = Comment::new(content, author, sequence, now);

        task.comments.push(comment.clone());
        task.comments_sequence = sequence;

        if !self.persist(&task.id, &task.comments, now) {
            tracing::debug!(task_id = %task.id, sequence, "comment kept in memory only");
        }

        Some(comment)
    }

    /// Write the full list and its write time. Returns whether the list is stored.
    pub fn persist(&self, task_id: &str, comments: &Vec<Comment>, now: Timestamp) -> bool {
        write_field::<CommentsSchemaV1>(&self.store, task_id, comments, now)
    }

    /// Read the persisted list. Absent and malformed lists both yield `None`.
    pub fn load(&self, task_id: &str) -> Option<Vec<Comment>> {
        read_field::<CommentsSchemaV1>(&self.store, task_id)?.value.ok()
    }
}

/// Comments ordered by sequence for display. The stored list is untouched.
pub fn sorted_by_sequence(comments: &[Comment]) -> Vec<Comment> {
    let mut sorted = comments.to_vec();
    sorted.sort_by_key(|c| c.sequence);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvBackend, MemoryBackend};

    fn task(id: &str) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "projectId": "p",
            "title": "t",
        }))
        .unwrap()
    }

    #[test]
    fn test_append_assigns_next_sequence() {
        let backend = MemoryBackend::new();
        let log = CommentLogManager::new(PersistentStore::from_backend(backend.clone()));
        let mut t = task("t1");

        let first = log.append(&mut t, "first", "Ada", Timestamp(1)).unwrap();
        let second = log.append(&mut t, "  second  ", "Ada", Timestamp(2)).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.content, "second");
        assert!(second.readonly);
        assert_eq!(t.comments_sequence, 2);
        assert_eq!(t.comments.len(), 2);

        assert_eq!(backend.get("task-comments-t1-timestamp").unwrap().as_deref(), Some("2"));
        assert_eq!(log.load("t1").unwrap(), t.comments);
    }

    #[test]
    fn test_blank_content_rejected() {
        let backend = MemoryBackend::new();
        let log = CommentLogManager::new(PersistentStore::from_backend(backend.clone()));
        let mut t = task("t1");

        assert!(log.append(&mut t, "   \n", "Ada", Timestamp(1)).is_none());
        assert!(t.comments.is_empty());
        assert_eq!(t.comments_sequence, 0);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_load_malformed_is_none() {
        let backend = MemoryBackend::new();
        backend.set("task-comments-t1", "[{broken").unwrap();
        let log = CommentLogManager::new(PersistentStore::from_backend(backend));

        assert!(log.load("t1").is_none());
        assert!(log.load("missing").is_none());
    }

    #[test]
    fn test_sorted_by_sequence() {
        let comments = vec![
            Comment::new("b", "x", 2, Timestamp(0)),
            Comment::new("a", "x", 1, Timestamp(0)),
        ];
        let sorted = sorted_by_sequence(&comments);
        assert_eq!(sorted[0].content, "a");
        assert_eq!(comments[0].content, "b");
    }
}
