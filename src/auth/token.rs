//! Bearer token issuance and verification
//!
//! This module issues HS256-signed JWTs for logins and for email
//! verification. Verification checks signature and expiry only; whether a
//! token is still usable also depends on its session and on the account.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{Identity, Role};

use super::password::generate_id;

/// Purpose claim carried by email verification tokens
pub const EMAIL_VERIFICATION_PURPOSE: &str = "email_verification";

/// Claims of a login token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    /// Random per issuance
    pub jti: String,
}

/// Claims of an email verification token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub email: String,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed login token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
    /// Lifetime granted; the paired session gets the same TTL
    pub ttl: Duration,
}

/// Signs and verifies tokens with a shared HMAC secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    verification_validation: Validation,
    token_ttl: Duration,
    remember_me_ttl: Duration,
    verification_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("token_ttl", &self.token_ttl)
            .field("remember_me_ttl", &self.remember_me_ttl)
            .field("verification_ttl", &self.verification_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], token_ttl: Duration, remember_me_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let mut verification_validation = Validation::new(Algorithm::HS256);
        verification_validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            verification_validation,
            token_ttl,
            remember_me_ttl,
            verification_ttl: Duration::from_secs(86400),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl(),
            config.remember_me_ttl(),
        )
        .with_verification_ttl(config.verification_ttl())
    }

    pub fn with_verification_ttl(mut self, ttl: Duration) -> Self {
        self.verification_ttl = ttl;
        self
    }

    /// Lifetime granted for a login
    pub fn ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.remember_me_ttl
        } else {
            self.token_ttl
        }
    }

    /// Issue a login token valid from now
    pub fn issue(&self, identity: &Identity, remember_me: bool) -> Result<IssuedToken, AuthError> {
        self.issue_at(identity, remember_me, Utc::now())
    }

    /// Issue a login token as if the current time were `now`
    pub fn issue_at(
        &self,
        identity: &Identity,
        remember_me: bool,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = self.ttl_for(remember_me);
        let expires_at = expiry(now, ttl)?;

        let claims = Claims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: generate_id(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign token");
            AuthError::Internal
        })?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
            ttl,
        })
    }

    /// Verify signature and expiry of a login token
    ///
    /// A token with a bad signature is `InvalidToken` even when it is also
    /// past its expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Issue an email verification token
    pub fn issue_verification(&self, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = VerificationClaims {
            email: email.to_string(),
            purpose: EMAIL_VERIFICATION_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: expiry(now, self.verification_ttl)?.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign verification token");
            AuthError::Internal
        })
    }

    /// Verify an email verification token
    pub fn verify_verification(&self, token: &str) -> Result<VerificationClaims, AuthError> {
        let claims = decode::<VerificationClaims>(token, &self.decoding, &self.verification_validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidVerificationToken)?;

        if claims.purpose != EMAIL_VERIFICATION_PURPOSE {
            return Err(AuthError::InvalidVerificationToken);
        }
        Ok(claims)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(AuthError::Internal)
}
