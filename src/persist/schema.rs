//! Versioned encodings of persisted fields.
//!
//! Every read goes through an explicit decode step that yields either a typed
//! value or a `Malformed` reason; nothing untyped leaks past this module.

use super::keys::FieldKind;
use crate::error::KvError;
use crate::types::{Comment, Timestamp};

/// Outcome of decoding a persisted value.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    Malformed(String),
}

impl<T> Decoded<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Decoded::Value(v) => Some(v),
            Decoded::Malformed(_) => None,
        }
    }
}

/// Encoding of one persisted field kind.
pub trait FieldSchema {
    type Value;

    const KIND: FieldKind;
    const VERSION: u32;
    /// Whether the load-time policy consults this field's write time.
    const TIMESTAMP_RESOLVED: bool;

    fn encode(value: &Self::Value) -> Result<String, KvError>;
    fn decode(raw: &str) -> Decoded<Self::Value>;
}

/// Notes are stored as the raw string.
pub struct NotesSchemaV1;

impl FieldSchema for NotesSchemaV1 {
    type Value = String;

    const KIND: FieldKind = FieldKind::Notes;
    const VERSION: u32 = 1;
    const TIMESTAMP_RESOLVED: bool = true;

    fn encode(value: &String) -> Result<String, KvError> {
        Ok(value.clone())
    }

    fn decode(raw: &str) -> Decoded<String> {
        Decoded::Value(raw.to_string())
    }
}

/// Comments are stored as a JSON array in append order.
pub struct CommentsSchemaV1;

impl FieldSchema for CommentsSchemaV1 {
    type Value = Vec<Comment>;

    const KIND: FieldKind = FieldKind::Comments;
    const VERSION: u32 = 1;
    const TIMESTAMP_RESOLVED: bool = false;

    fn encode(value: &Vec<Comment>) -> Result<String, KvError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(raw: &str) -> Decoded<Vec<Comment>> {
        let comments: Vec<Comment> = match serde_json::from_str(raw) {
            Ok(c) => c,
            Err(e) => return Decoded::Malformed(e.to_string()),
        };

        let mut last = 0u64;
        for comment in &comments {
            if comment.sequence <= last {
                return Decoded::Malformed(format!(
                    "comment {} has sequence {} after {}",
                    comment.id, comment.sequence, last
                ));
            }
            last = comment.sequence;
        }

        Decoded::Value(comments)
    }
}

pub fn encode_timestamp(at: Timestamp) -> String {
    at.0.to_string()
}

/// Parse a decimal epoch-millis value. Surrounding whitespace is ignored.
pub fn decode_timestamp(raw: &str) -> Option<Timestamp> {
    raw.trim().parse::<i64>().ok().map(Timestamp)
}
