//! Input validation for login and registration
//!
//! Validation collects every failing field so the client can show all
//! problems at once.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{LoginRequest, RegisterRequest, Role};

/// Characters that satisfy the "special character" password rule
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

const NAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=50;

/// A single failed field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^(\+254|0)[17]\d{8}$").expect("phone pattern is valid"))
}

/// Lowercase and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

/// Check for a Kenyan mobile number, `+254` or `0` prefixed
pub fn is_valid_phone(phone: &str) -> bool {
    phone_regex().is_match(phone.trim())
}

/// Check the password complexity rule
///
/// At least eight characters with a lowercase letter, an uppercase letter,
/// a digit and one of `@$!%*?&`.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Parse the optional self-registration role, defaulting to citizen
pub fn registration_role(role: Option<&str>) -> Option<Role> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Some(Role::Citizen),
        Some(raw) => raw
            .parse::<Role>()
            .ok()
            .filter(Role::is_self_assignable),
    }
}

/// Validate a registration request
pub fn validate_registration(request: &RegisterRequest) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if !is_valid_email(&request.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if !is_strong_password(&request.password) {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters with uppercase, lowercase, number and special character",
        ));
    }
    if let Some(phone) = request.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        if !is_valid_phone(phone) {
            errors.push(FieldError::new("phone", "Valid phone number is required"));
        }
    }
    if !NAME_LENGTH.contains(&request.first_name.trim().chars().count()) {
        errors.push(FieldError::new(
            "first_name",
            "First name must be between 2 and 50 characters",
        ));
    }
    if !NAME_LENGTH.contains(&request.last_name.trim().chars().count()) {
        errors.push(FieldError::new(
            "last_name",
            "Last name must be between 2 and 50 characters",
        ));
    }
    if registration_role(request.role.as_deref()).is_none() {
        errors.push(FieldError::new("role", "Invalid role"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a login request
pub fn validate_login(request: &LoginRequest) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if !is_valid_email(&request.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if request.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            email: "Jane.Doe@Example.com ".to_string(),
            password: "Secur3!pass".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_password_complexity() {
        assert!(is_strong_password("Secur3!pass"));
        assert!(!is_strong_password("S3!a"));
        assert!(!is_strong_password("secur3!pass"));
        assert!(!is_strong_password("SECUR3!PASS"));
        assert!(!is_strong_password("Secure!pass"));
        assert!(!is_strong_password("Secur3pass"));
        // `#` is not in the accepted set
        assert!(!is_strong_password("Secur3#pass"));
    }

    #[test]
    fn test_registration_role() {
        assert_eq!(registration_role(None), Some(Role::Citizen));
        assert_eq!(registration_role(Some("")), Some(Role::Citizen));
        assert_eq!(registration_role(Some("police")), Some(Role::Police));
        assert_eq!(registration_role(Some("admin")), None);
        assert_eq!(registration_role(Some("sheriff")), None);
    }

    #[test]
    fn test_validate_registration_ok() {
        assert!(validate_registration(&valid_request()).is_ok());
    }

    #[test]
    fn test_validate_registration_collects_all_errors() {
        let request = RegisterRequest {
            email: "nope".to_string(),
            password: "weak".to_string(),
            first_name: "J".to_string(),
            last_name: "D".repeat(51),
            role: Some("admin".to_string()),
            ..Default::default()
        };

        let errors = validate_registration(&request).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["email", "password", "first_name", "last_name", "role"]
        );
    }

    #[test]
    fn test_phone_format() {
        assert!(is_valid_phone("0712345678"));
        assert!(is_valid_phone("0112345678"));
        assert!(is_valid_phone("+254712345678"));
        assert!(is_valid_phone(" +254112345678 "));
        assert!(!is_valid_phone("0812345678"));
        assert!(!is_valid_phone("071234567"));
        assert!(!is_valid_phone("254712345678"));
        assert!(!is_valid_phone("<script>not a phone</script>"));
    }

    #[test]
    fn test_validate_registration_phone() {
        let mut request = valid_request();
        request.phone = Some("+254712345678".to_string());
        assert!(validate_registration(&request).is_ok());

        request.phone = Some("   ".to_string());
        assert!(validate_registration(&request).is_ok());

        request.phone = Some("<script>not a phone</script>".to_string());
        let errors = validate_registration(&request).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("phone", "Valid phone number is required")]);
    }

    #[test]
    fn test_validate_login() {
        assert!(validate_login(&LoginRequest::new("a@b.com", "x")).is_ok());

        let errors = validate_login(&LoginRequest::new("", "")).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
