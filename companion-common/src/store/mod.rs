//! Reference store: shared identifier -> record map
//!
//! External producers create an entry and write its `message` field. The
//! analyze service reads `message` and writes `nlp` (a wire frame holding the
//! analyzed text). Results are collected later by re-reading the entry.
//!
//! Backends:
//! - [`InMemoryReferenceStore`]: process-local, for tests and single-process use
//! - [`SqliteReferenceStore`]: SQLite file shared by every process on the host
//!
//! Writes are per field and last-writer-wins. No backend offers a
//! read-modify-write transaction across `get` and `put`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Result;

mod memory;
#[cfg(feature = "sqlx")]
mod sqlite;

pub use memory::InMemoryReferenceStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteReferenceStore;

/// Field holding the raw input text
pub const FIELD_MESSAGE: &str = "message";

/// Field holding the framed analysis result
pub const FIELD_NLP: &str = "nlp";

/// Record stored under one reference identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub fields: BTreeMap<String, Vec<u8>>,
}

impl ReferenceEntry {
    pub fn get(&self, field: &str) -> Option<&[u8]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Raw input text, if present and valid UTF-8
    pub fn message(&self) -> Option<&str> {
        self.get(FIELD_MESSAGE)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Framed analysis result, if already written
    pub fn nlp(&self) -> Option<&[u8]> {
        self.get(FIELD_NLP)
    }
}

/// Shared identifier -> record map
///
/// Implementations must give read-your-writes consistency for a single key.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Fetch the entry for `id`, `None` if no field was ever written
    async fn get(&self, id: &str) -> Result<Option<ReferenceEntry>>;

    /// Set one field of the entry for `id`, overwriting any previous value
    async fn put(&self, id: &str, field: &str, value: Vec<u8>) -> Result<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
