//! HTTP middleware for casegate
//!
//! This module provides the axum middleware that puts the access pipeline in
//! front of handlers:
//! - Required and optional authentication
//! - Role and permission guards
//! - Rate limiting by client address
//! - Request logging and tracing

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::Instrument;

use super::response::ApiError;
use super::router::AppState;
use crate::auth::{authorize, require_permission, AuthContext, RateDecision, RateLimitRule};
use crate::database::CredentialStore;
use crate::error::AuthError;
use crate::models::Role;

/// Id of the identity that made the request, attached to the response
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Resolve the client address used for rate limiting and logs
///
/// `X-Forwarded-For` is honoured only behind a trusted proxy.
pub fn client_ip(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn authorization_header(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// =============================================================================
// Authentication
// =============================================================================

/// Required-auth middleware
///
/// Runs the full access pipeline and attaches the `AuthContext` to the
/// request. Any rejection ends the request with the mapped status.
pub async fn require_auth<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = authorization_header(&request);

    let ctx = match state
        .auth_manager
        .authenticate(authorization.as_deref())
        .await
    {
        Ok(ctx) => ctx,
        Err(e) => {
            state.metrics.record_rejection(e.reason());
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = e.reason(),
                "Request rejected by access pipeline"
            );
            return Err(e.into());
        }
    };

    let user_id = ctx.identity.id.clone();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(response)
}

/// Optional-auth middleware
///
/// Attaches an `AuthContext` when the pipeline passes and lets the request
/// through anonymously otherwise.
pub async fn optional_auth<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = authorization_header(&request);

    let user_id = match state
        .auth_manager
        .authenticate_optional(authorization.as_deref())
        .await
    {
        Some(ctx) => {
            let id = ctx.identity.id.clone();
            request.extensions_mut().insert(ctx);
            Some(id)
        }
        None => None,
    };

    let mut response = next.run(request).await;
    if let Some(id) = user_id {
        response.extensions_mut().insert(AuthenticatedUser(id));
    }
    response
}

// =============================================================================
// Authorization
// =============================================================================

/// Admit only identities whose role is in `allowed`
///
/// Must run inside `require_auth`.
pub async fn role_guard<D: CredentialStore + 'static>(
    state: AppState<D>,
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(ApiError::Auth(AuthError::NoToken))?;

    if let Err(e) = authorize(&ctx.identity, allowed) {
        state.metrics.record_rejection(e.reason());
        tracing::warn!(
            user_id = %ctx.identity.id,
            role = %ctx.identity.role,
            path = %request.uri().path(),
            "Role not allowed"
        );
        return Err(e.into());
    }

    Ok(next.run(request).await)
}

/// Admit only identities holding `permission` (or admins)
///
/// Must run inside `require_auth`.
pub async fn permission_guard<D: CredentialStore + 'static>(
    state: AppState<D>,
    permission: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(ApiError::Auth(AuthError::NoToken))?;

    if let Err(e) = require_permission(&ctx.identity, permission) {
        state.metrics.record_rejection(e.reason());
        tracing::warn!(
            user_id = %ctx.identity.id,
            permission = permission,
            path = %request.uri().path(),
            "Permission missing"
        );
        return Err(e.into());
    }

    Ok(next.run(request).await)
}

// =============================================================================
// Rate limiting
// =============================================================================

/// General rate limit, applied to every API request
pub async fn rate_limit_general<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let rule = state.rate_limits.general.clone();
    throttle(&state, &rule, request, next).await
}

/// Strict rate limit for login and registration
pub async fn rate_limit_auth<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let rule = state.rate_limits.auth.clone();
    throttle(&state, &rule, request, next).await
}

async fn throttle<D: CredentialStore + 'static>(
    state: &AppState<D>,
    rule: &RateLimitRule,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.rate_limits.enabled {
        return Ok(next.run(request).await);
    }

    let client = client_ip(&request, state.trust_proxy);

    match state.rate_limiter.check(rule, &client).await {
        RateDecision::Deny { retry_after } => {
            state.metrics.record_rate_limited(&rule.class);
            tracing::warn!(
                client = %client,
                rule = %rule.class,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            Err(AuthError::RateLimitExceeded {
                retry_after_secs: whole_seconds(retry_after),
            }
            .into())
        }
        RateDecision::Allow {
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            set_rate_limit_headers(
                response.headers_mut(),
                rule.max_requests,
                remaining,
                reset_after,
            );
            Ok(response)
        }
    }
}

/// Round up to whole seconds, never below one
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

// Nested rules: the innermost (strictest) rule's headers win.
fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64, reset: Duration) {
    headers
        .entry("ratelimit-limit")
        .or_insert_with(|| HeaderValue::from(limit));
    headers
        .entry("ratelimit-remaining")
        .or_insert_with(|| HeaderValue::from(remaining));
    headers
        .entry("ratelimit-reset")
        .or_insert_with(|| HeaderValue::from(whole_seconds(reset)));
}

// =============================================================================
// Logging
// =============================================================================

/// Request logging and tracing middleware
///
/// Wraps the request in an `http_request` span and, once the response is
/// known, logs it at a level chosen from the status: error for 5xx, warn
/// for 4xx, info otherwise. Also records the request duration metric.
pub async fn request_logging<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_ip(&request, state.trust_proxy);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;

        let elapsed = start.elapsed();
        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        let user_id = response
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|u| u.0.as_str())
            .unwrap_or("anonymous");

        state
            .metrics
            .record_request_duration(method.as_str(), status.as_u16(), elapsed.as_secs_f64());

        let duration_ms = elapsed.as_millis() as u64;
        if status.is_server_error() {
            tracing::error!(method = %method, path = %path, status = status.as_u16(), duration_ms, client = %client, user_agent = %user_agent, user_id = %user_id, "Request failed");
        } else if status.is_client_error() {
            tracing::warn!(method = %method, path = %path, status = status.as_u16(), duration_ms, client = %client, user_agent = %user_agent, user_id = %user_id, "Request rejected");
        } else {
            tracing::info!(method = %method, path = %path, status = status.as_u16(), duration_ms, client = %client, user_agent = %user_agent, user_id = %user_id, "Request completed");
        }

        response
    }
    .instrument(span)
    .await
}
