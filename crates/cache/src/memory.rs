use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use leaveflow_core::ports::CacheError;

use crate::store::CacheStore;

/// Minimum time between full sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    value: String,
    expires_at: Instant,
}

struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Instant,
}

/// Process-local cache. Expired entries read as absent; a read drops the
/// touched entry and writes sweep the whole map at most once per
/// `SWEEP_INTERVAL`.
pub struct InMemoryCacheStore {
    entries: RwLock<Entries>,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Entries { map: HashMap::new(), last_sweep: Instant::now() }) }
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.map.values().filter(|entry| entry.expires_at > now).count()
    }

    #[cfg(test)]
    async fn stored(&self) -> usize {
        self.entries.read().await.map.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.map.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries.map.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.map.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        if now.duration_since(entries.last_sweep) >= SWEEP_INTERVAL {
            entries.map.retain(|_, entry| entry.expires_at > now);
            entries.last_sweep = now;
        }
        entries
            .map
            .insert(key.to_string(), Entry { value: value.to_string(), expires_at: now + ttl });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.map.remove(key);
        Ok(())
    }

    async fn del_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.entries.write().await.map.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{InMemoryCacheStore, SWEEP_INTERVAL};
    use crate::store::CacheStore;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = InMemoryCacheStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.expect("set");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.expect("get"), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn prefix_delete_leaves_other_keys() {
        let store = InMemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        store.set("lf_list_page_1_page_size_10", "a", ttl).await.expect("set");
        store.set("lf_list_page_2_page_size_10", "b", ttl).await.expect("set");
        store.set("lf_id_4", "c", ttl).await.expect("set");

        store.del_by_prefix("lf_list").await.expect("del");

        assert_eq!(store.get("lf_list_page_1_page_size_10").await.expect("get"), None);
        assert_eq!(store.get("lf_id_4").await.expect("get").as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_sweep_expired_entries_once_per_interval() {
        let store = InMemoryCacheStore::new();
        store.set("short_1", "a", Duration::from_secs(1)).await.expect("set");
        store.set("short_2", "b", Duration::from_secs(1)).await.expect("set");

        tokio::time::advance(Duration::from_secs(2)).await;
        store.set("long", "c", Duration::from_secs(600)).await.expect("set");
        assert_eq!(store.stored().await, 3);
        assert_eq!(store.len().await, 1);

        tokio::time::advance(SWEEP_INTERVAL).await;
        store.set("later", "d", Duration::from_secs(600)).await.expect("set");
        assert_eq!(store.stored().await, 2);
        assert_eq!(store.get("long").await.expect("get").as_deref(), Some("c"));
    }
}
