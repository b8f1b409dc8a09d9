//! Reading and writing one persisted field through its schema.
//!
//! A field is a value key plus a `-timestamp` key. The value is written
//! first. If the timestamp then fails and the schema's load policy reads
//! timestamps, both keys are removed so no untimestamped value is left behind.

use super::keys::FieldKind;
use super::schema::{decode_timestamp, encode_timestamp, Decoded, FieldSchema};
use crate::kv::PersistentStore;
use crate::types::Timestamp;

/// A field value read back from storage.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredField<T> {
    pub value: Decoded<T>,
    /// Write time, if present and parseable.
    pub written_at: Option<Timestamp>,
}

/// Read `owner`'s field. `None` if the value key is absent or unreadable.
pub fn read_field<S: FieldSchema>(store: &PersistentStore, owner: &str) -> Option<StoredField<S::Value>> {
    let kind: FieldKind = S::KIND;
    let raw = store.get(&kind.value_key(owner))?;

    let value = S::decode(&raw);
    if let Decoded::Malformed(reason) = &value {
        tracing::warn!(%kind, version = S::VERSION, owner, %reason, "ignoring malformed persisted field");
    }

    let written_at = store.get(&kind.timestamp_key(owner)).and_then(|raw| {
        let parsed = decode_timestamp(&raw);
        if parsed.is_none() {
            tracing::warn!(%kind, owner, raw = %raw, "ignoring unparseable timestamp");
        }
        parsed
    });

    Some(StoredField { value, written_at })
}

/// Write `value` and its write time. Returns whether the value is stored.
pub fn write_field<S: FieldSchema>(
    store: &PersistentStore,
    owner: &str,
    value: &S::Value,
    now: Timestamp,
) -> bool {
    let kind = S::KIND;
    let encoded = match S::encode(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::warn!(%kind, version = S::VERSION, owner, error = %e, "failed to encode field");
            return false;
        }
    };

    let value_key = kind.value_key(owner);
    let timestamp_key = kind.timestamp_key(owner);

    if !store.set(&value_key, &encoded) {
        return false;
    }
    if store.set(&timestamp_key, &encode_timestamp(now)) {
        return true;
    }

    if S::TIMESTAMP_RESOLVED {
        tracing::debug!(%kind, owner, "timestamp write failed, dropping value");
        clear_field::<S>(store, owner);
        false
    } else {
        true
    }
}

/// Remove both keys of `owner`'s field.
pub fn clear_field<S: FieldSchema>(store: &PersistentStore, owner: &str) -> bool {
    let removed_value = store.remove(&S::KIND.value_key(owner));
    let removed_timestamp = store.remove(&S::KIND.timestamp_key(owner));
    removed_value && removed_timestamp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvError;
    use crate::kv::{self, KvBackend, MemoryBackend};
    use crate::persist::{CommentsSchemaV1, NotesSchemaV1};
    use crate::types::Comment;

    /// Memory backend that refuses writes to keys ending in `-timestamp`.
    #[derive(Clone, Default)]
    struct NoTimestamps(MemoryBackend);

    impl KvBackend for NoTimestamps {
        fn get(&self, key: &str) -> kv::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> kv::Result<()> {
            if key.ends_with("-timestamp") {
                return Err(KvError::QuotaExceeded {
                    limit: 0,
                    requested: value.len() as u64,
                });
            }
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> kv::Result<()> {
            self.0.remove(key)
        }

        fn keys(&self) -> kv::Result<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn test_write_then_read() {
        let backend = MemoryBackend::new();
        let store = PersistentStore::from_backend(backend.clone());

        assert!(write_field::<NotesSchemaV1>(&store, "t1", &"hello".to_string(), Timestamp(42)));
        assert_eq!(backend.get("task-notes-t1").unwrap().as_deref(), Some("hello"));
        assert_eq!(backend.get("task-notes-t1-timestamp").unwrap().as_deref(), Some("42"));

        let stored = read_field::<NotesSchemaV1>(&store, "t1").unwrap();
        assert_eq!(stored.value, Decoded::Value("hello".to_string()));
        assert_eq!(stored.written_at, Some(Timestamp(42)));
        assert!(read_field::<NotesSchemaV1>(&store, "t2").is_none());
    }

    #[test]
    fn test_unparseable_timestamp_reads_as_absent() {
        let backend = MemoryBackend::new();
        backend.set("task-notes-t1", "text").unwrap();
        backend.set("task-notes-t1-timestamp", "soon").unwrap();

        let stored = read_field::<NotesSchemaV1>(&PersistentStore::from_backend(backend), "t1").unwrap();
        assert_eq!(stored.written_at, None);
    }

    #[test]
    fn test_failed_notes_timestamp_leaves_no_value() {
        let backend = NoTimestamps::default();
        backend.0.set("task-notes-t1", "older").unwrap();
        backend.0.set("task-notes-t1-timestamp", "1").unwrap();
        let store = PersistentStore::from_backend(backend.clone());

        assert!(!write_field::<NotesSchemaV1>(&store, "t1", &"newer".to_string(), Timestamp(2)));
        assert!(!backend.0.contains_key("task-notes-t1"));
        assert!(!backend.0.contains_key("task-notes-t1-timestamp"));
    }

    #[test]
    fn test_failed_comments_timestamp_keeps_list() {
        let backend = NoTimestamps::default();
        let store = PersistentStore::from_backend(backend.clone());
        let comments = vec![Comment::new("hi", "me", 1, Timestamp(0))];

        assert!(write_field::<CommentsSchemaV1>(&store, "t1", &comments, Timestamp(5)));
        let stored = read_field::<CommentsSchemaV1>(&store, "t1").unwrap();
        assert_eq!(stored.value, Decoded::Value(comments));
        assert_eq!(stored.written_at, None);
    }

    #[test]
    fn test_clear_field() {
        let backend = MemoryBackend::new();
        let store = PersistentStore::from_backend(backend.clone());
        write_field::<NotesSchemaV1>(&store, "t1", &"x".to_string(), Timestamp(1));

        assert!(clear_field::<NotesSchemaV1>(&store, "t1"));
        assert!(backend.is_empty());
    }
}
