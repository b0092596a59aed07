use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use tracing::{debug, info};

use leaveflow_core::ports::CacheError;

use crate::store::CacheStore;

const SCAN_BATCH: usize = 100;

pub struct RedisCacheStore {
    conn: ConnectionManager,
}

fn backend(error: RedisError) -> CacheError {
    CacheError::Backend(error.to_string())
}

/// `MATCH` pattern for keys starting with `prefix`, with glob metacharacters
/// in the prefix escaped so they match literally.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\' | '^') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

impl RedisCacheStore {
    /// Connects with a managed, auto-reconnecting connection.
    ///
    /// `url` is a `redis://` or `rediss://` URL and may carry credentials, so
    /// it is never logged.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;

        info!(event_name = "system.cache.connected", backend = "redis", "connected to redis");

        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await.map_err(backend)?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(backend)?;
        Ok(())
    }

    async fn del_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let pattern = prefix_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            if !keys.is_empty() {
                let _: () = conn.del(&keys).await.map_err(backend)?;
                removed += keys.len();
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix = %prefix, removed, "deleted cache keys by prefix");
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(backend)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{prefix_pattern, RedisCacheStore};
    use crate::store::CacheStore;

    #[test]
    fn prefix_pattern_escapes_glob_metacharacters() {
        assert_eq!(prefix_pattern("leaveflow:leaves_employee"), "leaveflow:leaves_employee*");
        assert_eq!(prefix_pattern("lf*"), "lf\\**");
        assert_eq!(prefix_pattern("a?b[c]"), "a\\?b\\[c\\]*");
        assert_eq!(prefix_pattern("back\\slash"), "back\\\\slash*");
    }

    // Needs a running Redis: REDIS_URL=redis://localhost:6379 cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn prefix_delete_walks_every_scan_batch() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let store = RedisCacheStore::connect(&url).await.expect("connect");
        let ttl = Duration::from_secs(30);

        for page in 0..250 {
            store.set(&format!("lftest_list_page_{page}"), "x", ttl).await.expect("set");
        }
        store.set("lftest_id_1", "keep", ttl).await.expect("set");

        store.del_by_prefix("lftest_list").await.expect("del");

        assert_eq!(store.get("lftest_list_page_249").await.expect("get"), None);
        assert_eq!(store.get("lftest_id_1").await.expect("get").as_deref(), Some("keep"));
        store.del("lftest_id_1").await.expect("cleanup");
    }
}
