//! Generic key-value store the configuration documents live in.
//!
//! [`HttpDataStore`] talks to `/api/dataStore/{namespace}`; [`MemoryDataStore`]
//! keeps everything in a map and counts writes, which is what the tests use.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use serde_json::Value;

use crate::dhis2::{error_for_status, Dhis2Client};
use crate::error::{ConfigError, Result};

pub const DEFAULT_NAMESPACE: &str = "capture";

/// Read/write access to JSON documents under one namespace.
pub trait DataStore: Send + Sync {
    /// `None` when the key does not exist.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Replace the whole document stored under `key`, creating it if needed.
    fn write(&self, key: &str, value: &Value) -> impl Future<Output = Result<()>> + Send;

    /// Create a key that does not exist yet.
    fn create(&self, key: &str, value: &Value) -> impl Future<Output = Result<()>> + Send;

    /// Every key in the namespace. An unknown namespace has no keys.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpDataStore {
    client: Dhis2Client,
    namespace: String,
}

impl HttpDataStore {
    pub fn new(client: Dhis2Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key_path(&self, key: &str) -> String {
        format!("dataStore/{}/{}", self.namespace, key)
    }
}

impl DataStore for HttpDataStore {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        match self.client.get_value(&self.key_path(key), &[]).await {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.key_path(key);
        match self.client.put_json(&path, value).await {
            Err(ConfigError::NotFound(_)) => {
                tracing::debug!(namespace = %self.namespace, key, "Key missing on update, creating it");
                self.client.post_json(&path, value).await
            }
            other => other,
        }
    }

    async fn create(&self, key: &str, value: &Value) -> Result<()> {
        self.client.post_json(&self.key_path(key), value).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        match self
            .client
            .get_json::<Vec<String>>(&format!("dataStore/{}", self.namespace), &[])
            .await
        {
            Ok(keys) => Ok(keys),
            Err(ConfigError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryDataStore {
    docs: Mutex<HashMap<String, Value>>,
    writes: Mutex<Vec<String>>,
    fail_writes_with: Mutex<Option<u16>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I, K>(docs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::new();
        store
            .docs
            .lock()
            .extend(docs.into_iter().map(|(k, v)| (k.into(), v)));
        store
    }

    /// Current value of a key, bypassing the write log.
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.docs.lock().get(key).cloned()
    }

    /// Keys written so far, in order.
    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    /// Make every following write/create fail with `status`; `None` heals the store.
    pub fn fail_writes_with(&self, status: Option<u16>) {
        *self.fail_writes_with.lock() = status;
    }

    fn check_writable(&self) -> Result<()> {
        match *self.fail_writes_with.lock() {
            Some(status) => Err(error_for_status(status, "")),
            None => Ok(()),
        }
    }
}

impl DataStore for MemoryDataStore {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.snapshot(key))
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        self.check_writable()?;
        self.docs.lock().insert(key.to_string(), value.clone());
        self.writes.lock().push(key.to_string());
        Ok(())
    }

    async fn create(&self, key: &str, value: &Value) -> Result<()> {
        self.check_writable()?;
        let mut docs = self.docs.lock();
        if docs.contains_key(key) {
            return Err(ConfigError::Http {
                status: Some(409),
                message: format!("Key '{key}' already exists"),
            });
        }
        docs.insert(key.to_string(), value.clone());
        self.writes.lock().push(key.to_string());
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.docs.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
