//! Password hashing and random identifiers
//!
//! Passwords are stored as Argon2id PHC strings. Identity ids and token ids
//! are random bytes encoded in URL-safe Base64.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

/// Length of a generated identifier in bytes
const ID_RANDOM_BYTES: usize = 16;

/// Well-formed Argon2id PHC string with the default cost parameters
///
/// No password matches it. Verifying against it costs as much as a real
/// check, which keeps failed logins for unknown accounts as slow as wrong
/// passwords.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$Y2FzZWdhdGUtZHVtbXktc2FsdCE$LXEWQrcmsEQBYnyp+6wy9chTD7GQPMTbAiWHF5IaSIE";

#[cfg(test)]
thread_local! {
    static VERIFY_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Number of password verifications run on the current thread
#[cfg(test)]
pub(crate) fn verify_calls() -> usize {
    VERIFY_CALLS.with(|calls| calls.get())
}

/// Generate a random URL-safe identifier
///
/// # Example
///
/// ```
/// use casegate::auth::password::generate_id;
///
/// let id = generate_id();
/// assert_eq!(id.len(), 22);
/// ```
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a password using Argon2id
///
/// The hash includes a random salt and uses the crate's default parameters.
///
/// # Errors
///
/// Returns an error if hashing fails (should not happen in normal operation)
///
/// # Example
///
/// ```
/// use casegate::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("Str0ng!Pass").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("Str0ng!Pass", &hash));
/// ```
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a password against a stored hash
///
/// Returns `false` for a wrong password and for an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    #[cfg(test)]
    VERIFY_CALLS.with(|calls| calls.set(calls.get() + 1));

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Run a full verification that always fails
///
/// Called on login paths that reject before reaching a stored hash.
pub fn verify_dummy(password: &str) {
    let _ = verify_password(password, DUMMY_HASH);
}

/// Error type for password hashing operations
#[derive(Debug, Clone, PartialEq)]
pub enum HashError {
    /// Hashing failed
    HashFailed(String),
}

impl std::fmt::Display for HashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashError::HashFailed(msg) => write!(f, "Hash failed: {}", msg),
        }
    }
}

impl std::error::Error for HashError {}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: generate_id creates unique ids
    #[test]
    fn test_generate_id_is_unique() {
        assert_ne!(generate_id(), generate_id());
    }

    // Test 2: generate_id encodes 16 random bytes
    #[test]
    fn test_generate_id_length() {
        let decoded = URL_SAFE_NO_PAD.decode(generate_id()).unwrap();
        assert_eq!(decoded.len(), ID_RANDOM_BYTES);
    }

    // Test 3: hash_password produces argon2id hash
    #[test]
    fn test_hash_password_argon2id() {
        let hash = hash_password("Passw0rd!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    // Test 4: same password, different salts
    #[test]
    fn test_hash_password_unique_salts() {
        let hash1 = hash_password("Passw0rd!").unwrap();
        let hash2 = hash_password("Passw0rd!").unwrap();
        assert_ne!(hash1, hash2);
    }

    // Test 5: verify_password succeeds for the right password only
    #[test]
    fn test_verify_password() {
        let hash = hash_password("Passw0rd!").unwrap();
        assert!(verify_password("Passw0rd!", &hash));
        assert!(!verify_password("passw0rd!", &hash));
        assert!(!verify_password("", &hash));
    }

    // Test 6: verify_password fails for invalid hash format
    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(!verify_password("Passw0rd!", "not_a_valid_hash"));
    }

    // Test 7: the dummy hash parses and matches nothing
    #[test]
    fn test_dummy_hash_is_well_formed() {
        let parsed = PasswordHash::new(DUMMY_HASH).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(!verify_password("", DUMMY_HASH));
        assert!(!verify_password("Passw0rd!", DUMMY_HASH));
    }

    // Test 8: verify_dummy runs a verification
    #[test]
    fn test_verify_dummy_counts_as_verification() {
        let before = verify_calls();
        verify_dummy("anything");
        assert_eq!(verify_calls(), before + 1);
    }
}
