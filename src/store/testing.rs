//! Binding store doubles shared by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{BindingStore, MemoryBindingStore};
use crate::error::StoreError;

/// A single call observed by `RecordingStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get(String),
    SetWithTtl(String, String, u64),
    RefreshTtl(String, u64),
    Delete(String),
}

/// Memory store that records every call made through the trait.
pub struct RecordingStore {
    inner: MemoryBindingStore,
    calls: Mutex<Vec<StoreCall>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryBindingStore::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Inserts a binding without recording a call.
    pub fn seed(&self, key: &str, value: &str) {
        self.inner.insert(key, value, 60);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change store state.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, StoreCall::Get(_)))
            .collect()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BindingStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.record(StoreCall::Get(key.to_string()));
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.record(StoreCall::SetWithTtl(
            key.to_string(),
            value.to_string(),
            ttl_secs,
        ));
        self.inner.set_with_ttl(key, value, ttl_secs).await
    }

    async fn refresh_ttl(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.record(StoreCall::RefreshTtl(key.to_string(), ttl_secs));
        self.inner.refresh_ttl(key, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(key.to_string()));
        self.inner.delete(key).await
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl BindingStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn refresh_ttl(&self, _key: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
