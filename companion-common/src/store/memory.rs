//! In-memory reference store
//!
//! Not persistent and not shared between processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ReferenceEntry, ReferenceStore};
use crate::Result;

#[derive(Clone, Default)]
pub struct InMemoryReferenceStore {
    entries: Arc<RwLock<HashMap<String, ReferenceEntry>>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for producers and tests: create an entry with its message
    pub async fn insert_message(&self, id: &str, message: &str) {
        let mut entries = self.entries.write().await;
        entries
            .entry(id.to_string())
            .or_default()
            .fields
            .insert(super::FIELD_MESSAGE.to_string(), message.as_bytes().to_vec());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn get(&self, id: &str) -> Result<Option<ReferenceEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(&self, id: &str, field: &str, value: Vec<u8>) -> Result<()> {
        self.entries
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), value);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FIELD_MESSAGE, FIELD_NLP};

    #[tokio::test]
    async fn test_missing_entry_is_none() {
        let store = InMemoryReferenceStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_keeps_other_fields() {
        let store = InMemoryReferenceStore::new();
        store.insert_message("x1", "John Smith went home.").await;
        store.put("x1", FIELD_NLP, vec![1, 2, 3]).await.unwrap();

        let entry = store.get("x1").await.unwrap().unwrap();
        assert_eq!(entry.message(), Some("John Smith went home."));
        assert_eq!(entry.nlp(), Some(&[1u8, 2, 3][..]));
        assert_eq!(entry.get(FIELD_MESSAGE).unwrap().len(), 21);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = InMemoryReferenceStore::new();
        store.put("x1", FIELD_NLP, vec![1]).await.unwrap();
        store.put("x1", FIELD_NLP, vec![2]).await.unwrap();
        assert_eq!(store.get("x1").await.unwrap().unwrap().nlp(), Some(&[2u8][..]));
        assert_eq!(store.len().await, 1);
    }
}
