//! Session bindings: the `BindingStore` seam and the client the router uses.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::{RoutingError, StoreError};
use crate::session::SessionId;

/// A TTL key-value store holding session → target bindings.
///
/// Keys are opaque strings; expiry is enforced by the store itself.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, expiring after `ttl_secs`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Resets the expiry of an existing key.
    async fn refresh_ttl(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Removes `key`.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Binding operations in terms of session ids.
///
/// Owns the key namespace and TTL. Writes are spawned onto the runtime and
/// never awaited by the request path; the returned handle lets callers wait
/// when they need to. Failed writes are logged and dropped, never retried.
#[derive(Clone)]
pub struct BindingClient {
    store: Arc<dyn BindingStore>,
    key_prefix: Arc<str>,
    key_expiry: u64,
}

impl BindingClient {
    pub fn new(store: Arc<dyn BindingStore>, key_prefix: &str, key_expiry: u64) -> Self {
        Self {
            store,
            key_prefix: Arc::from(key_prefix),
            key_expiry,
        }
    }

    /// Returns the store key for a session id.
    pub fn key_for(&self, sid: &SessionId) -> String {
        format!("{}{}", self.key_prefix, sid)
    }

    /// Looks up the target bound to `sid`.
    ///
    /// A store read failure is indistinguishable from a miss for the caller:
    /// both fail open to rerouting.
    pub async fn lookup(&self, sid: &SessionId) -> Result<String, RoutingError> {
        let key = self.key_for(sid);
        match self.store.get(&key).await {
            Ok(Some(target)) => Ok(target),
            Ok(None) => Err(RoutingError::UnknownBinding {
                sid: sid.to_string(),
            }),
            Err(e) => {
                tracing::warn!(sid = %sid, error = %e, "binding lookup failed");
                Err(RoutingError::UnknownBinding {
                    sid: sid.to_string(),
                })
            }
        }
    }

    /// Creates a binding from `sid` to `target`.
    pub fn bind(&self, sid: &SessionId, target: &str) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let key = self.key_for(sid);
        let target = target.to_string();
        let ttl = self.key_expiry;
        let sid = sid.clone();

        tokio::spawn(async move {
            match store.set_with_ttl(&key, &target, ttl).await {
                Ok(()) => tracing::info!(sid = %sid, backend = %target, "binding created"),
                Err(e) => {
                    tracing::warn!(sid = %sid, error = %e, "error while creating binding")
                }
            }
        })
    }

    /// Extends the binding of `sid` by another `key_expiry` seconds.
    pub fn refresh(&self, sid: &SessionId) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let key = self.key_for(sid);
        let ttl = self.key_expiry;
        let sid = sid.clone();

        tokio::spawn(async move {
            if let Err(e) = store.refresh_ttl(&key, ttl).await {
                tracing::warn!(sid = %sid, error = %e, "error while delaying expiry");
            }
        })
    }

    /// Removes the binding of `sid`.
    pub fn unbind(&self, sid: &SessionId) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let key = self.key_for(sid);
        let sid = sid.clone();

        tokio::spawn(async move {
            match store.delete(&key).await {
                Ok(()) => tracing::debug!(sid = %sid, "binding deleted"),
                Err(e) => {
                    tracing::warn!(sid = %sid, error = %e, "error while deleting binding")
                }
            }
        })
    }
}
