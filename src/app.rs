//! Component wiring
//!
//! Turns a validated `Config` into the application state the server runs
//! on. Nothing below this point reads configuration or the environment.

use std::sync::Arc;

use crate::auth::{AuthManager, SessionCache, TokenService};
use crate::cache::build_store;
use crate::config::Config;
use crate::database::SqliteDatabase;
use crate::error::AppError;
use crate::server::{AppState, RateLimits};
use crate::telemetry::AuthMetrics;

/// Build the application state for `config`
///
/// Validates the configuration, opens the credential store and connects
/// the cache backend. Must be called inside a tokio runtime.
pub async fn build_state(
    config: &Config,
    metrics: Arc<AuthMetrics>,
) -> Result<AppState<SqliteDatabase>, AppError> {
    config.validate()?;

    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    tracing::info!(path = %config.database.path, "Credential store opened");

    let cache = build_store(&config.cache)?;
    let cache_timeout = config.cache.operation_timeout();

    let tokens = TokenService::from_config(&config.auth);
    let sessions = SessionCache::new(Arc::clone(&cache), cache_timeout);
    let auth_manager = AuthManager::new(database, tokens, sessions)
        .with_store_timeout(config.database.operation_timeout())
        .with_client_url(config.auth.client_url.as_str());

    let rate_limits = RateLimits::from_config(&config.rate_limit);
    tracing::info!(
        enabled = rate_limits.enabled,
        general_max = rate_limits.general.max_requests,
        auth_max = rate_limits.auth.max_requests,
        "Rate limiting configured"
    );

    Ok(AppState::new(Arc::new(auth_manager), cache, cache_timeout)
        .with_rate_limits(rate_limits)
        .with_metrics(metrics)
        .with_trust_proxy(config.server.trust_proxy))
}
