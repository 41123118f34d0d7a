//! JSON response envelope
//!
//! Every body is `{success, message}` plus `data` on success and `errors`
//! on validation failure.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::FieldError;
use crate::error::AuthError;

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Error half of every handler and middleware
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    Auth(AuthError),
    Validation(Vec<FieldError>),
    NotFound,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

/// HTTP status for an auth outcome
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::NoToken
        | AuthError::InvalidToken
        | AuthError::TokenExpired
        | AuthError::SessionExpired
        | AuthError::AccountInactiveOrMissing
        | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::RoleDenied | AuthError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        AuthError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::MalformedRequest
        | AuthError::AlreadyExists
        | AuthError::InvalidVerificationToken => StatusCode::BAD_REQUEST,
        AuthError::UserNotFound => StatusCode::NOT_FOUND,
        AuthError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn envelope(status: StatusCode, message: String, errors: Option<Vec<FieldError>>) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        message,
        data: None,
        errors,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(err) => {
                let mut response = envelope(status_for(&err), err.to_string(), None);
                if let AuthError::RateLimitExceeded { retry_after_secs } = err {
                    response.headers_mut().insert(
                        header::RETRY_AFTER,
                        HeaderValue::from(retry_after_secs),
                    );
                }
                response
            }
            ApiError::Validation(errors) => envelope(
                StatusCode::BAD_REQUEST,
                AuthError::MalformedRequest.to_string(),
                Some(errors),
            ),
            ApiError::NotFound => envelope(StatusCode::NOT_FOUND, "Route not found".to_string(), None),
        }
    }
}
