//! Application error types for casegate
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;

/// Authentication and authorization errors
///
/// Every variant maps to a user-safe message; internal detail (store
/// connection failures, signing problems) is logged where it happens and
/// never carried in the variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Request body failed validation
    #[error("Validation failed")]
    MalformedRequest,

    /// Unknown email, wrong password or inactive account at login
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing or malformed bearer token
    #[error("No token provided, authorization denied")]
    NoToken,

    /// Token failed signature or structure checks
    #[error("Invalid token")]
    InvalidToken,

    /// Token is well-formed and signed but past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// Session for the token is absent (logged out, expired or never created)
    #[error("Session expired, please login again")]
    SessionExpired,

    /// The token's subject is missing or not active
    #[error("User not found or account deactivated")]
    AccountInactiveOrMissing,

    /// Role not in the route's allowed set
    #[error("Insufficient permissions")]
    RoleDenied,

    /// A specific permission is missing
    #[error("Permission '{0}' required")]
    PermissionDenied(String),

    /// Too many requests for the current window
    #[error("Too many requests, please try again later")]
    RateLimitExceeded {
        /// Seconds until the current window closes
        retry_after_secs: u64,
    },

    /// Credential store or cache could not be reached
    #[error("Service temporarily unavailable")]
    StoreUnavailable,

    /// Registration collided with an existing email or phone
    #[error("User already exists with this email or phone number")]
    AlreadyExists,

    /// Email verification token is invalid, expired or already used
    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    /// Target of an administrative lookup does not exist
    #[error("User not found")]
    UserNotFound,

    /// Anything else the client should not see details of
    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    /// Short, stable label used in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedRequest => "malformed_request",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::NoToken => "no_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::SessionExpired => "session_expired",
            AuthError::AccountInactiveOrMissing => "account_inactive_or_missing",
            AuthError::RoleDenied => "role_denied",
            AuthError::PermissionDenied(_) => "permission_denied",
            AuthError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AuthError::StoreUnavailable => "store_unavailable",
            AuthError::AlreadyExists => "already_exists",
            AuthError::InvalidVerificationToken => "invalid_verification_token",
            AuthError::UserNotFound => "user_not_found",
            AuthError::Internal => "internal",
        }
    }
}

/// Cache-related errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend could not be reached or returned an error
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Operation did not complete within the configured timeout
    #[error("Cache operation timed out")]
    Timeout,

    /// Serialization error
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection-thread error from tokio-rusqlite
    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Operation did not complete within the configured timeout
    #[error("Database operation timed out")]
    Timeout,
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The provider rejected or failed to deliver the message
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
