//! Cache-aside reads shared by every lookup the services expose.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::ports::{CacheError, StoreError};

/// One cacheable lookup: where to find it in the cache, where to find it in
/// the store, and how to put a store result back into the cache.
#[async_trait]
pub trait ReadThrough: Send + Sync {
    type Value: Send + Sync;

    /// Short label for log events, e.g. `leave 42`.
    fn describe(&self) -> String;

    async fn fetch_cached(&self) -> Result<Option<Self::Value>, CacheError>;

    async fn fetch_stored(&self) -> Result<Option<Self::Value>, StoreError>;

    async fn populate(&self, value: &Self::Value) -> Result<(), CacheError>;
}

/// Serves from cache when possible, otherwise from the store, then fills the
/// cache. Cache failures behave exactly like misses.
pub async fn read_through<R>(lookup: &R) -> Result<Option<R::Value>, StoreError>
where
    R: ReadThrough + ?Sized,
{
    match lookup.fetch_cached().await {
        Ok(Some(value)) => {
            debug!(event_name = "cache.hit", lookup = %lookup.describe(), "served from cache");
            return Ok(Some(value));
        }
        Ok(None) => {
            debug!(event_name = "cache.miss", lookup = %lookup.describe(), "cache miss");
        }
        Err(error) => {
            warn!(
                event_name = "cache.read_failed",
                lookup = %lookup.describe(),
                error = %error,
                "cache read failed, falling back to store"
            );
        }
    }

    let Some(value) = lookup.fetch_stored().await? else {
        return Ok(None);
    };

    best_effort("cache.write_failed", &lookup.describe(), lookup.populate(&value).await);
    Ok(Some(value))
}

/// Logs and discards the outcome of a cache write or invalidation.
pub fn best_effort(event_name: &'static str, subject: &str, result: Result<(), CacheError>) {
    if let Err(error) = result {
        warn!(event_name, subject = %subject, error = %error, "cache operation failed");
    }
}
