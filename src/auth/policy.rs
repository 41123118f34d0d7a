//! Role and permission checks
//!
//! Both checks are pure functions of an already-authenticated identity.

use crate::error::AuthError;
use crate::models::{Identity, Role};

/// Admit the identity only if its role is one of `allowed`
///
/// Admin gets no implicit pass here; list it explicitly.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AuthError::RoleDenied)
    }
}

/// Admit the identity if it holds `permission` or is an admin
pub fn require_permission(identity: &Identity, permission: &str) -> Result<(), AuthError> {
    if identity.role == Role::Admin || identity.permissions.contains(permission) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied(permission.to_string()))
    }
}
