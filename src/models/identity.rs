//! Identity domain models
//!
//! This module defines the account model read by the access pipeline, the
//! credential record used only by the login flow, and the request/response
//! bodies of the login and registration entry points.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Known permission strings
///
/// Permissions are stored as free-form strings; these are the ones the
/// application hands out by default.
pub mod permissions {
    pub const CREATE_CASE: &str = "create_case";
    pub const UPDATE_CASE: &str = "update_case";
    pub const VIEW_CASES: &str = "view_cases";
    pub const VIEW_OWN_CASES: &str = "view_own_cases";
    pub const MANAGE_INVESTIGATION: &str = "manage_investigation";
    pub const ACCESS_FORENSICS: &str = "access_forensics";
    pub const PROVIDE_SUPPORT: &str = "provide_support";
    pub const VIEW_USERS: &str = "view_users";
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Police,
    Dci,
    Ngo,
    Investigator,
    Citizen,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Police => "police",
            Role::Dci => "dci",
            Role::Ngo => "ngo",
            Role::Investigator => "investigator",
            Role::Citizen => "citizen",
        }
    }

    /// Whether the role may be chosen at self-registration
    pub fn is_self_assignable(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    /// Permissions granted to a newly registered account with this role
    pub fn default_permissions(&self) -> BTreeSet<String> {
        use permissions::*;

        let granted: &[&str] = match self {
            Role::Admin => &[],
            Role::Police => &[CREATE_CASE, UPDATE_CASE, VIEW_CASES, MANAGE_INVESTIGATION],
            Role::Dci => &[
                CREATE_CASE,
                UPDATE_CASE,
                VIEW_CASES,
                MANAGE_INVESTIGATION,
                ACCESS_FORENSICS,
            ],
            Role::Ngo => &[CREATE_CASE, VIEW_CASES, PROVIDE_SUPPORT],
            Role::Investigator => &[CREATE_CASE, VIEW_CASES, MANAGE_INVESTIGATION],
            Role::Citizen => &[CREATE_CASE, VIEW_OWN_CASES],
        };

        granted.iter().map(|p| p.to_string()).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "police" => Ok(Role::Police),
            "dci" => Ok(Role::Dci),
            "ngo" => Ok(Role::Ngo),
            "investigator" => Ok(Role::Investigator),
            "citizen" => Ok(Role::Citizen),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Pending,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "pending" => Ok(AccountStatus::Pending),
            other => Err(format!("Unknown account status: {}", other)),
        }
    }
}

/// An account as seen by the access pipeline
///
/// Never carries the password digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub permissions: BTreeSet<String>,
    pub status: AccountStatus,
    pub organization: Option<String>,
    pub badge_number: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Create an active identity with no permissions
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            phone: None,
            first_name: String::new(),
            last_name: String::new(),
            role,
            permissions: BTreeSet::new(),
            status: AccountStatus::Active,
            organization: None,
            badge_number: None,
            email_verified: false,
            phone_verified: false,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    /// Set the permission set
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the account status
    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    /// Set first and last name
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Identity plus password digest, used only by the login flow
#[derive(Clone)]
pub struct Credentials {
    pub identity: Identity,
    pub password_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// A validated registration ready to be persisted
#[derive(Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub permissions: BTreeSet<String>,
    pub organization: Option<String>,
    pub badge_number: Option<String>,
    pub password_hash: String,
    pub verification_token: Option<String>,
}

impl fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_hash", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Public view of an identity returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: AccountStatus,
    pub permissions: BTreeSet<String>,
    pub organization: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
}

impl From<&Identity> for IdentitySummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: identity.role,
            status: identity.status,
            permissions: identity.permissions.clone(),
            organization: identity.organization.clone(),
            email_verified: identity.email_verified,
            phone_verified: identity.phone_verified,
        }
    }
}

/// Registration request body
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default, alias = "badgeNumber")]
    pub badge_number: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Login request body
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "rememberMe")]
    pub remember_me: bool,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("remember_me", &self.remember_me)
            .finish_non_exhaustive()
    }
}

/// Successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token, shown to the client once
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: IdentitySummary,
}

/// Successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredIdentity {
    pub user: IdentitySummary,
}

/// Email verification request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Admin status change request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AccountStatus,
}
