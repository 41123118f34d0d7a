//! Session cache
//!
//! A session is the revocable half of a login: the token proves who issued
//! it, the session proves it has not been logged out. Sessions live in the
//! shared cache under `session:<token>` and expire with their token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::error::CacheError;
use crate::models::Session;

const SESSION_PREFIX: &str = "session:";

/// Typed access to session records in a cache store
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn CacheStore>,
    timeout: Duration,
}

impl SessionCache {
    pub fn new(store: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    fn key(token: &str) -> String {
        format!("{}{}", SESSION_PREFIX, token)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| CacheError::Timeout)?
    }

    /// Store a session for `token`, replacing any existing one
    pub async fn put(&self, token: &str, session: &Session, ttl: Duration) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(session).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let key = Self::key(token);

        self.bounded(self.store.set(&key, &payload, ttl)).await
    }

    /// Look up the session for `token`
    ///
    /// Absent, unreadable and unreachable all read as `None`.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let key = Self::key(token);

        let payload = match self.bounded(self.store.get(&key)).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(error = %e, backend = self.store.name(), "Session lookup failed");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(error = %e, "Discarding undecodable session record");
                None
            }
        }
    }

    /// Remove the session for `token`
    pub async fn delete(&self, token: &str) -> Result<(), CacheError> {
        let key = Self::key(token);
        self.bounded(self.store.delete(&key)).await
    }
}
