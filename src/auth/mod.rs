//! Authentication and access control for casegate
//!
//! This module provides:
//! - Signed bearer tokens and email verification tokens
//! - Revocable sessions in the shared cache
//! - The per-request access pipeline and the login/registration flows
//! - Role and permission policy
//! - Request throttling on shared counters

pub mod manager;
pub mod password;
pub mod policy;
pub mod ratelimit;
pub mod session;
pub mod token;
pub mod validation;

pub use manager::{extract_bearer, AuthContext, AuthManager};
pub use policy::{authorize, require_permission};
pub use ratelimit::{FailurePolicy, RateDecision, RateLimitRule, RateLimiter};
pub use session::SessionCache;
pub use token::{Claims, IssuedToken, TokenService};
pub use validation::FieldError;
