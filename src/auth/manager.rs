//! Authentication manager
//!
//! This module provides the main authentication interface for the application.
//! It runs the per-request access pipeline (token, session, account) and the
//! registration, verification, login and logout flows that feed it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::database::CredentialStore;
use crate::error::{AuthError, DbError};
use crate::models::{
    AccountStatus, Identity, IdentitySummary, LoginRequest, LoginResponse, NewIdentity,
    RegisterRequest, RegisteredIdentity, Session,
};
use crate::notify::{LogNotifier, Notifier};

use super::password::{generate_id, hash_password, verify_dummy, verify_password};
use super::session::SessionCache;
use super::token::{Claims, TokenService};
use super::validation::{normalize_email, registration_role, validate_login, validate_registration};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// A request that passed the access pipeline
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Account as currently stored, not as it was at login
    pub identity: Identity,
    /// The bearer token presented
    pub token: String,
    /// Verified claims of the token
    pub claims: Claims,
}

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// Any other scheme, or an empty token, yields `None`.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Authentication manager
///
/// Composes the token service, the session cache and the credential store
/// into one access decision per request.
pub struct AuthManager<D: CredentialStore> {
    store: Arc<D>,
    tokens: TokenService,
    sessions: SessionCache,
    notifier: Arc<dyn Notifier>,
    store_timeout: Duration,
    client_url: String,
}

impl<D: CredentialStore> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(store: Arc<D>, tokens: TokenService, sessions: SessionCache) -> Self {
        Self {
            store,
            tokens,
            sessions,
            notifier: Arc::new(LogNotifier::new()),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            client_url: "http://localhost:3000".to_string(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Frontend base URL used to build verification links
    pub fn with_client_url(mut self, url: impl Into<String>) -> Self {
        self.client_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<D> {
        &self.store
    }

    async fn store_call<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .unwrap_or(Err(DbError::Timeout))
    }

    // =========================================================================
    // Access pipeline
    // =========================================================================

    /// Run the full access pipeline for a required-auth route
    ///
    /// Stages run in order: token presence, token signature and expiry,
    /// session liveness, account status. The first failure wins.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = extract_bearer(authorization).ok_or(AuthError::NoToken)?;

        let claims = self.tokens.verify(token)?;

        let session = self
            .sessions
            .get(token)
            .await
            .ok_or(AuthError::SessionExpired)?;
        if session.user_id != claims.sub {
            tracing::warn!(sub = %claims.sub, "Session belongs to a different identity");
            return Err(AuthError::SessionExpired);
        }

        let identity = self
            .store_call(self.store.find_by_id(&claims.sub))
            .await
            .map_err(|e| store_unavailable("find_by_id", e))?
            .filter(Identity::is_active)
            .ok_or(AuthError::AccountInactiveOrMissing)?;

        Ok(AuthContext {
            identity,
            token: token.to_string(),
            claims,
        })
    }

    /// Run the pipeline for an optional-auth route
    ///
    /// Every rejection, including an absent header, becomes anonymous.
    pub async fn authenticate_optional(&self, authorization: Option<&str>) -> Option<AuthContext> {
        match self.authenticate(authorization).await {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                if authorization.is_some() {
                    tracing::debug!(reason = e.reason(), "Optional authentication fell back to anonymous");
                }
                None
            }
        }
    }

    // =========================================================================
    // Account flows
    // =========================================================================

    /// Register a new identity
    ///
    /// The account starts active with an unverified email; the verification
    /// link goes to the notifier, whose failure is logged but not fatal.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisteredIdentity, AuthError> {
        validate_registration(&request).map_err(|_| AuthError::MalformedRequest)?;
        let role = registration_role(request.role.as_deref()).ok_or(AuthError::MalformedRequest)?;

        let email = normalize_email(&request.email);
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let exists = self
            .store_call(self.store.email_or_phone_exists(&email, phone.clone()))
            .await
            .map_err(|e| store_unavailable("email_or_phone_exists", e))?;
        if exists {
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = hash_password(&request.password).map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            AuthError::Internal
        })?;
        let verification_token = self.tokens.issue_verification(&email)?;

        let new_identity = NewIdentity {
            id: generate_id(),
            email,
            phone,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            role,
            permissions: role.default_permissions(),
            organization: request.organization.filter(|o| !o.trim().is_empty()),
            badge_number: request.badge_number.filter(|b| !b.trim().is_empty()),
            password_hash,
            verification_token: Some(verification_token.clone()),
        };

        let identity = self
            .store_call(self.store.create_identity(&new_identity))
            .await
            .map_err(|e| match e {
                DbError::ConstraintViolation(_) => AuthError::AlreadyExists,
                other => store_unavailable("create_identity", other),
            })?;

        let link = format!(
            "{}/verify-email?token={}",
            self.client_url, verification_token
        );
        if let Err(e) = self
            .notifier
            .send_verification(&identity.email, &identity.first_name, &link)
            .await
        {
            tracing::warn!(user_id = %identity.id, error = %e, "Verification email not sent");
        }

        tracing::info!(user_id = %identity.id, role = %identity.role, "User registered");

        Ok(RegisteredIdentity {
            user: IdentitySummary::from(&identity),
        })
    }

    /// Confirm an email address from a verification token
    pub async fn verify_email(&self, token: &str) -> Result<IdentitySummary, AuthError> {
        let claims = self.tokens.verify_verification(token)?;

        let identity = self
            .store_call(self.store.find_by_verification_token(token))
            .await
            .map_err(|e| store_unavailable("find_by_verification_token", e))?
            .filter(|identity| identity.email == claims.email)
            .ok_or(AuthError::InvalidVerificationToken)?;

        self.store_call(self.store.update_verification(&identity.id, true, None))
            .await
            .map_err(|e| store_unavailable("update_verification", e))?;

        tracing::info!(user_id = %identity.id, "Email verified");

        let mut summary = IdentitySummary::from(&identity);
        summary.email_verified = true;
        Ok(summary)
    }

    /// Authenticate credentials and start a session
    ///
    /// Unknown email, inactive account and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        validate_login(&request).map_err(|_| AuthError::MalformedRequest)?;
        let email = normalize_email(&request.email);

        let credentials = self
            .store_call(self.store.find_credentials_by_email(&email))
            .await
            .map_err(|e| store_unavailable("find_credentials_by_email", e))?;

        let credentials = match credentials {
            Some(credentials) if credentials.identity.is_active() => credentials,
            Some(credentials) => {
                tracing::info!(user_id = %credentials.identity.id, "Login refused for inactive account");
                verify_dummy(&request.password);
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                verify_dummy(&request.password);
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !verify_password(&request.password, &credentials.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let mut identity = credentials.identity;
        let now = Utc::now();

        if let Err(e) = self
            .store_call(self.store.update_last_login(&identity.id, now))
            .await
        {
            tracing::warn!(user_id = %identity.id, error = %e, "Failed to record last login");
        } else {
            identity.last_login_at = Some(now);
        }

        let issued = self.tokens.issue(&identity, request.remember_me)?;
        let session = Session::for_identity(&identity, issued.expires_at);

        self.sessions
            .put(&issued.token, &session, issued.ttl)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %identity.id, error = %e, "Failed to create session");
                AuthError::StoreUnavailable
            })?;

        tracing::info!(
            user_id = %identity.id,
            remember_me = request.remember_me,
            "User logged in"
        );

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: IdentitySummary::from(&identity),
        })
    }

    /// End the session behind an authenticated request
    pub async fn logout(&self, ctx: &AuthContext) -> Result<(), AuthError> {
        self.sessions.delete(&ctx.token).await.map_err(|e| {
            tracing::error!(user_id = %ctx.identity.id, error = %e, "Failed to delete session");
            AuthError::StoreUnavailable
        })?;

        tracing::info!(user_id = %ctx.identity.id, "User logged out");
        Ok(())
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Look up any identity by id
    pub async fn find_identity(&self, id: &str) -> Result<Identity, AuthError> {
        self.store_call(self.store.find_by_id(id))
            .await
            .map_err(|e| store_unavailable("find_by_id", e))?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change an account's status
    ///
    /// Takes effect on the account's next request; live sessions of a
    /// suspended account fail the account check.
    pub async fn set_status(&self, id: &str, status: AccountStatus) -> Result<Identity, AuthError> {
        self.store_call(self.store.update_status(id, status))
            .await
            .map_err(|e| match e {
                DbError::NotFound => AuthError::UserNotFound,
                other => store_unavailable("update_status", other),
            })?;

        tracing::info!(user_id = %id, status = %status, "Account status changed");
        self.find_identity(id).await
    }
}

fn store_unavailable(operation: &'static str, err: DbError) -> AuthError {
    tracing::error!(operation = operation, error = %err, "Credential store call failed");
    AuthError::StoreUnavailable
}
