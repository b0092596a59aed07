//! Key-value cache backends and the typed leave/employee caches built on them.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;

use leaveflow_core::config::{CacheBackend, CacheConfig};
use leaveflow_core::ports::CacheError;

pub mod memory;
pub mod redis_store;
pub mod store;
pub mod typed;

pub use memory::InMemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use store::CacheStore;
pub use typed::{JsonEmployeeCache, JsonLeaveCache};

/// Typed caches sharing one backend, with disjoint key prefixes.
pub struct Caches {
    pub store: Arc<dyn CacheStore>,
    pub leaves: Arc<JsonLeaveCache>,
    pub employees: Arc<JsonEmployeeCache>,
}

impl Caches {
    pub fn over(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        let leaves =
            JsonLeaveCache::new(store.clone(), format!("{}:leaves", config.key_prefix), ttl);
        let employees =
            JsonEmployeeCache::new(store.clone(), format!("{}:employees", config.key_prefix), ttl);

        Self { store, leaves: Arc::new(leaves), employees: Arc::new(employees) }
    }
}

pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryCacheStore::new())),
        CacheBackend::Redis => {
            let url = config.url.as_ref().ok_or_else(|| {
                CacheError::Backend("cache.url is required for the redis backend".to_string())
            })?;
            Ok(Arc::new(RedisCacheStore::connect(url.expose_secret()).await?))
        }
    }
}
