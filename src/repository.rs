//! Cached configuration documents with a single writer per key.
//!
//! Each data-store key maps to one slot holding the last known copy of the
//! document. The slot's async mutex is held across read-merge-write, so two
//! saves for different contexts of the same document cannot interleave inside
//! this process. The cache only changes after the store acknowledged a write.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::datastore::DataStore;
use crate::error::{ConfigError, Result};

/// A multi-tenant document: context id → entry.
pub type Document = Map<String, Value>;

type Slot = Arc<Mutex<Option<Document>>>;

pub struct DocumentRepository<S> {
    store: S,
    slots: DashMap<String, Slot>,
}

impl<S: DataStore> DocumentRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            slots: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn slot(&self, key: &str) -> Slot {
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    async fn fetch(&self, key: &str) -> Result<Document> {
        match self.store.read(key).await? {
            None | Some(Value::Null) => Ok(Document::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(ConfigError::validation(format!(
                "Data store key '{key}' holds {} instead of an object",
                json_kind(&other)
            ))),
        }
    }

    /// Cached document, fetched on first use. A missing key reads as empty.
    pub async fn get(&self, key: &str) -> Result<Document> {
        let slot = self.slot(key);
        let mut cached = slot.lock().await;
        if let Some(doc) = cached.as_ref() {
            return Ok(doc.clone());
        }
        let doc = self.fetch(key).await?;
        *cached = Some(doc.clone());
        Ok(doc)
    }

    /// Drop the cached copy and fetch it again.
    pub async fn refresh(&self, key: &str) -> Result<Document> {
        let slot = self.slot(key);
        let mut cached = slot.lock().await;
        let doc = self.fetch(key).await?;
        *cached = Some(doc.clone());
        Ok(doc)
    }

    pub async fn invalidate(&self, key: &str) {
        if let Some(slot) = self.slots.get(key).map(|s| s.clone()) {
            *slot.lock().await = None;
        }
    }

    /// Replace the whole document.
    pub async fn set(&self, key: &str, doc: Document) -> Result<()> {
        let slot = self.slot(key);
        let mut cached = slot.lock().await;
        self.store.write(key, &Value::Object(doc.clone())).await?;
        *cached = Some(doc);
        Ok(())
    }

    /// Write `{..document, [context_id]: value}`; every sibling entry is kept as is.
    pub async fn merge_entry(&self, key: &str, context_id: &str, value: Value) -> Result<Document> {
        let slot = self.slot(key);
        let mut cached = slot.lock().await;
        let mut doc = match cached.as_ref() {
            Some(doc) => doc.clone(),
            None => self.fetch(key).await?,
        };
        doc.insert(context_id.to_string(), value);

        self.store.write(key, &Value::Object(doc.clone())).await?;
        tracing::info!(key, context_id, entries = doc.len(), "Saved configuration entry");
        *cached = Some(doc.clone());
        Ok(doc)
    }

    /// Remove `context_id` from a freshly fetched copy of the document.
    /// Nothing is written when the entry does not exist; returns whether it did.
    pub async fn remove_entry(&self, key: &str, context_id: &str) -> Result<bool> {
        let slot = self.slot(key);
        let mut cached = slot.lock().await;
        let mut doc = self.fetch(key).await?;
        if doc.remove(context_id).is_none() {
            *cached = Some(doc);
            return Ok(false);
        }

        self.store.write(key, &Value::Object(doc.clone())).await?;
        tracing::info!(key, context_id, "Deleted configuration entry");
        *cached = Some(doc);
        Ok(true)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDataStore;
    use serde_json::json;

    fn repo_with(key: &str, doc: Value) -> DocumentRepository<MemoryDataStore> {
        DocumentRepository::new(MemoryDataStore::with_documents([(key, doc)]))
    }

    #[tokio::test]
    async fn merge_keeps_sibling_entries() {
        let repo = repo_with(
            "dataEntryForms",
            json!({"prog456": [{"id": "s", "elements": []}], "weird": 42}),
        );
        let before: Vec<String> = repo.get("dataEntryForms").await.unwrap().keys().cloned().collect();

        repo.merge_entry("dataEntryForms", "prog123", json!([]))
            .await
            .unwrap();

        let stored = repo.store().snapshot("dataEntryForms").unwrap();
        let stored = stored.as_object().unwrap();
        for key in &before {
            assert!(stored.contains_key(key));
        }
        assert_eq!(stored.len(), before.len() + 1);
        assert_eq!(stored["weird"], json!(42));
        assert_eq!(stored["prog456"], json!([{"id": "s", "elements": []}]));
        assert_eq!(stored["prog123"], json!([]));
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let repo = repo_with("enrollmentOverviewLayout", json!({"a": {"title": "A"}}));
        repo.get("enrollmentOverviewLayout").await.unwrap();

        repo.store().fail_writes_with(Some(403));
        let err = repo
            .merge_entry("enrollmentOverviewLayout", "b", json!({"title": "B"}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));

        let cached = repo.get("enrollmentOverviewLayout").await.unwrap();
        assert!(!cached.contains_key("b"));
    }

    #[tokio::test]
    async fn remove_entry_deletes_only_the_target() {
        let repo = repo_with(
            "enrollmentOverviewLayout",
            json!({"prog123": {"title": "x"}, "prog456": {"title": "y"}}),
        );
        assert!(repo.remove_entry("enrollmentOverviewLayout", "prog123").await.unwrap());
        assert_eq!(
            repo.store().snapshot("enrollmentOverviewLayout").unwrap(),
            json!({"prog456": {"title": "y"}})
        );
    }

    #[tokio::test]
    async fn remove_missing_entry_writes_nothing() {
        let repo = repo_with("enrollmentEventNewLayout", json!({"prog456": {}}));
        assert!(!repo.remove_entry("enrollmentEventNewLayout", "prog123").await.unwrap());
        assert!(repo.store().write_log().is_empty());
    }

    #[tokio::test]
    async fn missing_key_reads_as_empty_document() {
        let repo = DocumentRepository::new(MemoryDataStore::new());
        assert!(repo.get("dataEntryForms").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_object_document_is_rejected() {
        let repo = repo_with("dataEntryForms", json!([1, 2]));
        let err = repo.get("dataEntryForms").await.unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[tokio::test]
    async fn concurrent_merges_on_one_key_do_not_lose_entries() {
        let repo = Arc::new(repo_with("dataEntryForms", json!({})));
        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.merge_entry("dataEntryForms", &format!("ctx{i}"), json!([]))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let stored = repo.store().snapshot("dataEntryForms").unwrap();
        assert_eq!(stored.as_object().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn refresh_sees_external_changes() {
        let repo = repo_with("dataEntryForms", json!({}));
        repo.get("dataEntryForms").await.unwrap();
        repo.store().write("dataEntryForms", &json!({"x": []})).await.unwrap();
        assert!(repo.get("dataEntryForms").await.unwrap().is_empty());
        assert!(repo.refresh("dataEntryForms").await.unwrap().contains_key("x"));
        repo.invalidate("dataEntryForms").await;
        assert!(repo.get("dataEntryForms").await.unwrap().contains_key("x"));
    }
}
