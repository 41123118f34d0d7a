//! Shared cache stores for casegate
//!
//! Session records and rate-limit counters live in one store shared by all
//! gateway instances. Redis is the production backend; the in-process store
//! serves tests and single-node development.

pub mod traits;

mod memory;
mod redis;

pub use traits::{CacheStore, CounterState};

#[cfg(test)]
pub use traits::MockCacheStore;

pub use self::redis::RedisStore;
pub use memory::MemoryStore;

use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::error::CacheError;

const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the store selected by configuration
///
/// Must be called inside a tokio runtime.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.backend.as_str() {
        "memory" => {
            tracing::warn!("Using in-process cache store; sessions are not shared between instances");
            let store = MemoryStore::new();
            store.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
            Ok(Arc::new(store))
        }
        _ => {
            tracing::info!(url = %redact_url(&config.redis.url), "Using Redis cache store");
            Ok(Arc::new(RedisStore::new(&config.redis)?))
        }
    }
}

/// Hide credentials embedded in a connection URL
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
