//! Cache store trait and related types
//!
//! This module defines the CacheStore trait shared by the session cache and
//! the rate limiter, as well as the counter state returned by increments.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

/// State of a window counter after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    /// Value after the increment
    pub count: u64,
    /// Time until the counter resets
    pub ttl: Duration,
}

impl CounterState {
    pub fn new(count: u64, ttl: Duration) -> Self {
        Self { count, ttl }
    }
}

/// Key/value store with per-key expiry and atomic counters
///
/// Implementations must make `increment` atomic with respect to concurrent
/// callers on every node sharing the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the name of the backend
    fn name(&self) -> &str;

    /// Get a value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with a time-to-live, overwriting any previous value
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Atomically increment a counter
    ///
    /// The expiry is set to `window` when the counter is created (value 1)
    /// and is never extended by later increments.
    async fn increment(&self, key: &str, window: Duration) -> Result<CounterState, CacheError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), CacheError>;
}
