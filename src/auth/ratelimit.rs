//! Rate limiter for inbound requests
//!
//! This module provides fixed-window request throttling keyed by client.
//! Counters live in the shared cache so every instance sees the same
//! counts; the store makes each increment atomic.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::config::RateLimitRuleConfig;
use crate::error::CacheError;

const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// What to do when the counter store cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the request
    Open,
    /// Deny the request
    Closed,
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow {
        /// Requests left in the current window
        remaining: u64,
        /// Time until the window resets
        reset_after: Duration,
    },
    Deny {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allow { .. })
    }
}

/// A named throttling rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Counter namespace, e.g. `general` or `auth`
    pub class: String,
    pub window: Duration,
    pub max_requests: u64,
    pub failure_policy: FailurePolicy,
}

impl RateLimitRule {
    pub fn new(
        class: impl Into<String>,
        window: Duration,
        max_requests: u64,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            class: class.into(),
            window,
            max_requests,
            failure_policy,
        }
    }

    /// 100 requests per 15 minutes, admit on store failure
    pub fn general() -> Self {
        Self::new("general", Duration::from_secs(900), 100, FailurePolicy::Open)
    }

    /// 5 requests per 15 minutes, deny on store failure
    pub fn auth() -> Self {
        Self::new("auth", Duration::from_secs(900), 5, FailurePolicy::Closed)
    }

    pub fn from_config(class: impl Into<String>, config: &RateLimitRuleConfig) -> Self {
        let failure_policy = if config.fail_closed {
            FailurePolicy::Closed
        } else {
            FailurePolicy::Open
        };

        Self::new(
            class,
            Duration::from_secs(config.window_secs),
            config.max_requests,
            failure_policy,
        )
    }

    /// Counter key for a client under this rule
    pub fn key_for(&self, client: &str) -> String {
        format!("{}{}:{}", RATE_LIMIT_PREFIX, self.class, client)
    }
}

/// Rate limiter over a shared counter store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Count one request against `key` and decide whether to admit it
    ///
    /// The counter is never decremented; it resets when its window expires.
    pub async fn admit(
        &self,
        key: &str,
        window: Duration,
        max_count: u64,
        failure_policy: FailurePolicy,
    ) -> RateDecision {
        let result = tokio::time::timeout(self.timeout, self.store.increment(key, window))
            .await
            .unwrap_or(Err(CacheError::Timeout));

        match result {
            Ok(counter) if counter.count > max_count => RateDecision::Deny {
                retry_after: counter.ttl.max(Duration::from_secs(1)),
            },
            Ok(counter) => RateDecision::Allow {
                remaining: max_count - counter.count,
                reset_after: counter.ttl,
            },
            Err(e) => {
                tracing::error!(
                    key = %key,
                    error = %e,
                    policy = ?failure_policy,
                    "Rate limit counter unavailable"
                );
                match failure_policy {
                    FailurePolicy::Open => RateDecision::Allow {
                        remaining: max_count,
                        reset_after: window,
                    },
                    FailurePolicy::Closed => RateDecision::Deny {
                        retry_after: window,
                    },
                }
            }
        }
    }

    /// Apply a named rule to a client
    pub async fn check(&self, rule: &RateLimitRule, client: &str) -> RateDecision {
        self.admit(
            &rule.key_for(client),
            rule.window,
            rule.max_requests,
            rule.failure_policy,
        )
        .await
    }
}
