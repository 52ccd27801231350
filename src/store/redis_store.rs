//! Redis-backed binding store shared by all proxy instances.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::BindingStore;
use crate::error::StoreError;

/// Binding store over a multiplexed, auto-reconnecting Redis connection.
///
/// Bindings map to plain string keys with `SET .. EX` and `EXPIRE`.
#[derive(Clone)]
pub struct RedisBindingStore {
    conn: ConnectionManager,
}

impl RedisBindingStore {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl BindingStore for RedisBindingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn refresh_ttl(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let applied: bool = conn.expire(key, ttl_secs as i64).await?;
        if !applied {
            tracing::debug!(key = key, "expiry not delayed, key already gone");
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: u64 = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let result = RedisBindingStore::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(StoreError::Redis(_))));
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedisBindingStore>();
    }
}
