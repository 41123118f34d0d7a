//! In-process cache store
//!
//! This module implements the CacheStore trait over a locked hash map.
//! It is used by tests and single-node development setups; it is not
//! shared between processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CacheError;

use super::traits::{CacheStore, CounterState};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Hash-map backed store with lazy expiry
///
/// Expiry uses `tokio::time::Instant`, so paused-clock tests can advance it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Purge expired entries every `every` until the task is aborted
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged = purged, "Purged expired cache entries");
                }
            }
        })
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<CounterState, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let live = entries.get(key).filter(|e| !e.is_expired(now)).cloned();

        let state = match live {
            Some(entry) => {
                let current: u64 = entry.value.parse().map_err(|_| {
                    CacheError::Serialization(format!("value at {} is not a counter", key))
                })?;
                let count = current + 1;
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: count.to_string(),
                        expires_at: entry.expires_at,
                    },
                );
                CounterState::new(count, entry.expires_at.saturating_duration_since(now))
            }
            None => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: "1".to_string(),
                        expires_at: now + window,
                    },
                );
                CounterState::new(1, window)
            }
        };

        Ok(state)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Store name
    #[test]
    fn test_store_name() {
        assert_eq!(MemoryStore::new().name(), "memory");
    }

    // Test 2: Set and get
    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store
            .set("session:t", "{\"a\":1}", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.get("session:t").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(store.get("session:other").await.unwrap().is_none());
    }

    // Test 3: Set overwrites
    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryStore::new();
        store.set("k", "one", Duration::from_secs(60)).await.unwrap();
        store.set("k", "two", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    }

    // Test 4: Delete removes, and deleting twice is fine
    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    // Test 5: Entries expire after their TTL
    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }

    // Test 6: Increment creates with the window and keeps the original expiry
    #[tokio::test(start_paused = true)]
    async fn test_increment_keeps_expiry() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(900);

        let first = store.increment("c", window).await.unwrap();
        assert_eq!(first, CounterState::new(1, window));

        tokio::time::advance(Duration::from_secs(100)).await;
        let second = store.increment("c", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl, Duration::from_secs(800));
    }

    // Test 7: Counter resets after the window
    #[tokio::test(start_paused = true)]
    async fn test_increment_resets_after_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            store.increment("c", window).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(store.increment("c", window).await.unwrap().count, 1);
    }

    // Test 8: Concurrent increments never lose updates
    #[tokio::test]
    async fn test_concurrent_increments() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment("c", window).await.unwrap().count })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
    }

    // Test 9: Incrementing a non-counter value fails
    #[tokio::test]
    async fn test_increment_non_counter() {
        let store = MemoryStore::new();
        store.set("k", "text", Duration::from_secs(60)).await.unwrap();

        let result = store.increment("k", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    // Test 10: Ping always succeeds
    #[tokio::test]
    async fn test_ping() {
        assert!(MemoryStore::new().ping().await.is_ok());
    }

    // Test 11: Sweeper drops expired entries from the map
    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges() {
        let store = MemoryStore::new();
        store.set("short", "v", Duration::from_secs(10)).await.unwrap();
        store.set("long", "v", Duration::from_secs(600)).await.unwrap();
        let sweeper = store.spawn_sweeper(Duration::from_secs(30));
        // Let the sweeper start its first sleep before the clock moves
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.entries.read().await.len(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("v"));
        sweeper.abort();
    }
}
