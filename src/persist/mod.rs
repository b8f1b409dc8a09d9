//! Mapping between task fields and durable records.
//!
//! - [`keys`]: the key naming convention and key parsing
//! - [`schema`]: versioned encoders/decoders for each persisted field
//! - [`field`]: reading and writing a field's value and timestamp keys
//! - [`resolver`]: the load-time conflict policy between memory and storage

pub mod field;
pub mod keys;
pub mod resolver;
pub mod schema;

pub use field::{clear_field, read_field, write_field, StoredField};
pub use keys::{FieldKind, PersistedKey, TIMESTAMP_SUFFIX};
pub use resolver::{CommentsDecision, ConflictResolver, NotesDecision, OverrideReason};
pub use schema::{decode_timestamp, encode_timestamp, CommentsSchemaV1, Decoded, FieldSchema, NotesSchemaV1};
