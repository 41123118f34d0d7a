//! Shared fixtures for server tests

use std::sync::Arc;
use std::time::Duration;

use super::router::AppState;
use crate::auth::{AuthManager, SessionCache, TokenService};
use crate::cache::{CacheStore, MemoryStore};
use crate::database::MockCredentialStore;
use crate::models::{Identity, Session};

pub(crate) const SECRET: &[u8] = b"server-test-secret-0123456789abcdef";
const DAY: Duration = Duration::from_secs(86400);
const TIMEOUT: Duration = Duration::from_secs(1);

/// App state over a mock credential store and a fresh in-memory cache
pub(crate) fn state_with(
    store: MockCredentialStore,
) -> (AppState<MockCredentialStore>, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let cache: Arc<dyn CacheStore> = memory.clone();

    let tokens = TokenService::new(SECRET, DAY, DAY * 30);
    let sessions = SessionCache::new(Arc::clone(&cache), TIMEOUT);
    let manager = AuthManager::new(Arc::new(store), tokens, sessions);

    (AppState::new(Arc::new(manager), cache, TIMEOUT), memory)
}

/// Mock store whose `find_by_id` answers from `identities`
pub(crate) fn store_with(identities: Vec<Identity>) -> MockCredentialStore {
    let mut store = MockCredentialStore::new();
    store
        .expect_find_by_id()
        .returning(move |id| Ok(identities.iter().find(|i| i.id == id).cloned()));
    store
}

/// Issue a token for `identity` and open its session
pub(crate) async fn login_as(state: &AppState<MockCredentialStore>, identity: &Identity) -> String {
    let issued = state.auth_manager.tokens().issue(identity, false).unwrap();
    let session = Session::for_identity(identity, issued.expires_at);
    state
        .auth_manager
        .sessions()
        .put(&issued.token, &session, issued.ttl)
        .await
        .unwrap();
    issued.token
}
