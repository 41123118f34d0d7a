//! Domain models for casegate
//!
//! This module contains the core domain models used throughout the application.

pub mod identity;
pub mod session;

// Re-export commonly used types
pub use identity::{
    permissions, AccountStatus, Credentials, Identity, IdentitySummary, LoginRequest,
    LoginResponse, NewIdentity, RegisterRequest, RegisteredIdentity, Role, StatusUpdateRequest,
    VerifyEmailRequest,
};
pub use session::Session;
