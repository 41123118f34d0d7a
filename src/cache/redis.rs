//! Redis-backed cache store
//!
//! This module implements the CacheStore trait on a pooled Redis connection.
//! It is the store shared by every gateway instance in a deployment.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolSettings, Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, Script};

use crate::config::RedisConfig;
use crate::error::CacheError;

use super::traits::{CacheStore, CounterState};

/// Increment, set the expiry on first use, and report the remaining TTL in
/// one round trip. A counter left without an expiry is given one as well.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return {count, redis.call('TTL', KEYS[1])}
"#;

/// Redis cache store
pub struct RedisStore {
    pool: Pool,
    increment: Script,
}

impl RedisStore {
    /// Creates a store from configuration
    ///
    /// The pool connects lazily; call `ping` to check reachability.
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let mut settings = PoolSettings::from_url(&config.url);
        settings.pool = Some(PoolConfig::new(config.pool_size));

        let pool = settings
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }

    /// Creates a store on an existing pool
    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            increment: Script::new(INCREMENT_SCRIPT),
        }
    }
}

/// Redis expiries are whole seconds; never round a positive TTL down to zero
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
        tracing::trace!(key = %key, ttl_secs = ttl_secs(ttl), "Redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<CounterState, CacheError> {
        let mut conn = self.pool.get().await?;

        let (count, ttl): (u64, i64) = self
            .increment
            .key(key)
            .arg(ttl_secs(window))
            .invoke_async(&mut conn)
            .await?;

        let ttl = if ttl > 0 {
            Duration::from_secs(ttl as u64)
        } else {
            window
        };

        Ok(CounterState::new(count, ttl))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Unavailable(format!(
                "unexpected PING reply: {}",
                pong
            )))
        }
    }
}
