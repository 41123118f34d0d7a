//! HTTP router for casegate
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Registration, email verification, login and logout
//! - The current identity and administrative account lookups
//! - A public endpoint that personalizes for authenticated callers

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::middleware::{
    optional_auth, permission_guard, rate_limit_auth, rate_limit_general, request_logging,
    require_auth, role_guard,
};
use super::response::{ApiError, ApiResponse};
use crate::auth::validation::{validate_login, validate_registration};
use crate::auth::{AuthContext, AuthManager, FieldError, RateLimitRule, RateLimiter};
use crate::cache::CacheStore;
use crate::config::RateLimitSettings;
use crate::database::CredentialStore;
use crate::error::{AuthError, CacheError};
use crate::models::{
    permissions, AccountStatus, Identity, IdentitySummary, LoginRequest, LoginResponse,
    RegisterRequest, RegisteredIdentity, Role, StatusUpdateRequest, VerifyEmailRequest,
};
use crate::telemetry::AuthMetrics;

/// Throttling rules applied by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    pub enabled: bool,
    /// Applied to every `/api` request
    pub general: RateLimitRule,
    /// Applied to login and registration on top of `general`
    pub auth: RateLimitRule,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            general: RateLimitRule::general(),
            auth: RateLimitRule::auth(),
        }
    }
}

impl RateLimits {
    pub fn from_config(settings: &RateLimitSettings) -> Self {
        Self {
            enabled: settings.enabled,
            general: RateLimitRule::from_config("general", &settings.general),
            auth: RateLimitRule::from_config("auth", &settings.auth),
        }
    }
}

/// Shared application state
pub struct AppState<D: CredentialStore> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager<D>>,

    /// Session and counter store
    pub cache: Arc<dyn CacheStore>,

    /// Rate limiter over `cache`
    pub rate_limiter: RateLimiter,

    pub rate_limits: Arc<RateLimits>,

    pub metrics: Arc<AuthMetrics>,

    /// Take the client address from `X-Forwarded-For`
    pub trust_proxy: bool,

    cache_timeout: Duration,
}

impl<D: CredentialStore> AppState<D> {
    pub fn new(
        auth_manager: Arc<AuthManager<D>>,
        cache: Arc<dyn CacheStore>,
        cache_timeout: Duration,
    ) -> Self {
        Self {
            auth_manager,
            rate_limiter: RateLimiter::new(Arc::clone(&cache), cache_timeout),
            cache,
            rate_limits: Arc::new(RateLimits::default()),
            metrics: Arc::new(AuthMetrics::noop()),
            trust_proxy: false,
            cache_timeout,
        }
    }

    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = Arc::new(rate_limits);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}

impl<D: CredentialStore> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
            cache: Arc::clone(&self.cache),
            rate_limiter: self.rate_limiter.clone(),
            rate_limits: Arc::clone(&self.rate_limits),
            metrics: Arc::clone(&self.metrics),
            trust_proxy: self.trust_proxy,
            cache_timeout: self.cache_timeout,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `OK` or `DEGRADED`
    pub status: String,
    pub version: String,
    /// Cache backend name and reachability
    pub cache: CacheHealth,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealth {
    pub backend: String,
    pub reachable: bool,
}

/// Public greeting
#[derive(Debug, Serialize, Deserialize)]
pub struct Greeting {
    pub greeting: String,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentitySummary>,
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing the auth manager and stores
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router<D: CredentialStore + 'static>(state: AppState<D>) -> Router {
    let auth_entry = Router::new()
        .route("/register", post(register_handler::<D>))
        .route("/login", post(login_handler::<D>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_auth::<D>,
        ));

    let auth_session = Router::new()
        .route("/logout", post(logout_handler::<D>))
        .route("/me", get(me_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<D>,
        ));

    let auth_routes = Router::new()
        .route("/verify-email", post(verify_email_handler::<D>))
        .merge(auth_entry)
        .merge(auth_session);

    let permission_state = state.clone();
    let user_routes = Router::new()
        .route("/profile", get(profile_handler))
        .route(
            "/:id",
            get(get_user_handler::<D>).route_layer(middleware::from_fn(
                move |request: Request, next: Next| {
                    permission_guard(
                        permission_state.clone(),
                        permissions::VIEW_USERS,
                        request,
                        next,
                    )
                },
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<D>,
        ));

    let role_state = state.clone();
    let admin_routes = Router::new()
        .route("/users/:id/status", put(set_status_handler::<D>))
        .route_layer(middleware::from_fn(move |request: Request, next: Next| {
            role_guard(role_state.clone(), ADMIN_ONLY, request, next)
        }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<D>,
        ));

    let public_routes = Router::new()
        .route("/greeting", get(greeting_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth::<D>,
        ));

    let api = Router::new()
        .route("/health", get(health_handler::<D>))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/admin", admin_routes)
        .nest("/public", public_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_general::<D>,
        ));

    Router::new()
        .route("/health", get(health_handler::<D>))
        .nest("/api", api)
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_logging::<D>,
        ))
        .with_state(state)
}

fn malformed_body(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(vec![FieldError::new("body", rejection.body_text())])
}

// =============================================================================
// Health
// =============================================================================

/// Liveness plus a bounded cache ping
async fn health_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
) -> Response {
    let reachable = match tokio::time::timeout(state.cache_timeout, state.cache.ping())
        .await
        .unwrap_or(Err(CacheError::Timeout))
    {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(backend = state.cache.name(), error = %e, "Cache health check failed");
            false
        }
    };

    let (status_code, status) = if reachable {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DEGRADED")
    };

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheHealth {
            backend: state.cache.name().to_string(),
            reachable,
        },
        timestamp: Utc::now(),
    };

    (status_code, Json(body)).into_response()
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

// =============================================================================
// Account Handlers
// =============================================================================

async fn register_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<RegisteredIdentity>), ApiError> {
    let Json(request) = payload.map_err(malformed_body)?;

    if let Err(errors) = validate_registration(&request) {
        state
            .metrics
            .record_registration(AuthError::MalformedRequest.reason());
        return Err(ApiError::Validation(errors));
    }

    match state.auth_manager.register(request).await {
        Ok(registered) => {
            state.metrics.record_registration("success");
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(
                    "User registered successfully. Please check your email to verify your account.",
                    registered,
                ),
            ))
        }
        Err(e) => {
            state.metrics.record_registration(e.reason());
            Err(e.into())
        }
    }
}

async fn verify_email_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    payload: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> Result<ApiResponse<IdentitySummary>, ApiError> {
    let Json(request) = payload.map_err(malformed_body)?;

    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation(vec![FieldError::new(
            "token",
            "Verification token is required",
        )]));
    }

    let user = state.auth_manager.verify_email(token).await?;
    Ok(ApiResponse::ok("Email verified successfully", user))
}

async fn login_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(malformed_body)?;

    if let Err(errors) = validate_login(&request) {
        state.metrics.record_login(AuthError::MalformedRequest.reason());
        return Err(ApiError::Validation(errors));
    }

    match state.auth_manager.login(request).await {
        Ok(login) => {
            state.metrics.record_login("success");
            Ok(ApiResponse::ok("Login successful", login))
        }
        Err(e) => {
            state.metrics.record_login(e.reason());
            Err(e.into())
        }
    }
}

async fn logout_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<ApiResponse<()>, ApiError> {
    state.auth_manager.logout(&ctx).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

async fn me_handler(Extension(ctx): Extension<AuthContext>) -> ApiResponse<IdentitySummary> {
    ApiResponse::ok("Current user", IdentitySummary::from(&ctx.identity))
}

/// Full stored profile of the caller
async fn profile_handler(Extension(ctx): Extension<AuthContext>) -> ApiResponse<Identity> {
    ApiResponse::ok("Profile retrieved", ctx.identity)
}

// =============================================================================
// Administration Handlers
// =============================================================================

async fn get_user_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<IdentitySummary>, ApiError> {
    let identity = state.auth_manager.find_identity(&id).await?;
    Ok(ApiResponse::ok(
        "User retrieved",
        IdentitySummary::from(&identity),
    ))
}

async fn set_status_handler<D: CredentialStore + 'static>(
    State(state): State<AppState<D>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<ApiResponse<IdentitySummary>, ApiError> {
    let Json(request) = payload.map_err(malformed_body)?;

    // Admins may not suspend their own account.
    if id == ctx.identity.id && request.status != AccountStatus::Active {
        return Err(ApiError::Validation(vec![FieldError::new(
            "status",
            "Administrators cannot deactivate their own account",
        )]));
    }

    let identity = state.auth_manager.set_status(&id, request.status).await?;
    tracing::info!(
        admin_id = %ctx.identity.id,
        user_id = %identity.id,
        status = %identity.status,
        "Status updated by administrator"
    );

    Ok(ApiResponse::ok(
        "User status updated",
        IdentitySummary::from(&identity),
    ))
}

// =============================================================================
// Public Handlers
// =============================================================================

async fn greeting_handler(ctx: Option<Extension<AuthContext>>) -> ApiResponse<Greeting> {
    let greeting = match ctx {
        Some(Extension(ctx)) => Greeting {
            greeting: format!("Welcome back, {}", ctx.identity.first_name),
            authenticated: true,
            user: Some(IdentitySummary::from(&ctx.identity)),
        },
        None => Greeting {
            greeting: "Welcome, guest".to_string(),
            authenticated: false,
            user: None,
        },
    };

    ApiResponse::ok("Greeting", greeting)
}
