//! Credential store for casegate
//!
//! This module defines the credential store trait and its SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{AccountStatus, Credentials, Identity, NewIdentity};

/// Persistent identity and credential storage
///
/// This trait defines all persistence operations needed by the auth core.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // =========================================================================
    // Lookups
    // =========================================================================

    /// Find an identity by id, regardless of status
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, DbError>;

    /// Find an identity by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DbError>;

    /// Find an identity together with its password digest
    async fn find_credentials_by_email(&self, email: &str)
        -> Result<Option<Credentials>, DbError>;

    /// Check whether the email or (when given) the phone number is taken
    async fn email_or_phone_exists(
        &self,
        email: &str,
        phone: Option<String>,
    ) -> Result<bool, DbError>;

    /// Find the identity holding a pending verification token
    async fn find_by_verification_token(&self, token: &str) -> Result<Option<Identity>, DbError>;

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Persist a new identity and return it as stored
    ///
    /// Returns `DbError::ConstraintViolation` when the email or phone is taken.
    async fn create_identity(&self, identity: &NewIdentity) -> Result<Identity, DbError>;

    /// Record a successful login
    async fn update_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), DbError>;

    /// Set the email verification flag and the pending verification token
    async fn update_verification(
        &self,
        id: &str,
        email_verified: bool,
        token: Option<String>,
    ) -> Result<(), DbError>;

    /// Change the account status
    ///
    /// Returns `DbError::NotFound` when no identity has this id.
    async fn update_status(&self, id: &str, status: AccountStatus) -> Result<(), DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    // Test 1: MockCredentialStore returns a configured identity
    #[tokio::test]
    async fn test_mock_store_find_by_id() {
        let mut mock = MockCredentialStore::new();

        mock.expect_find_by_id()
            .withf(|id| id == "u1")
            .returning(|id| Ok(Some(Identity::new(id, "a@b.com", Role::Police))));

        let identity = mock.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(identity.role, Role::Police);
    }

    // Test 2: MockCredentialStore reports missing identities
    #[tokio::test]
    async fn test_mock_store_missing_identity() {
        let mut mock = MockCredentialStore::new();

        mock.expect_find_by_id().returning(|_| Ok(None));

        assert!(mock.find_by_id("missing").await.unwrap().is_none());
    }

    // Test 3: MockCredentialStore can surface store failures
    #[tokio::test]
    async fn test_mock_store_error() {
        let mut mock = MockCredentialStore::new();

        mock.expect_update_status()
            .returning(|_, _| Err(DbError::NotFound));

        let result = mock.update_status("u1", AccountStatus::Suspended).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    // Test 4: trait objects are usable behind Arc
    #[tokio::test]
    async fn test_store_as_trait_object() {
        let mut mock = MockCredentialStore::new();
        mock.expect_email_or_phone_exists()
            .returning(|email, _| Ok(email == "taken@b.com"));

        let store: std::sync::Arc<dyn CredentialStore> = std::sync::Arc::new(mock);
        assert!(store.email_or_phone_exists("taken@b.com", None).await.unwrap());
        assert!(!store
            .email_or_phone_exists("free@b.com", Some("+254700000000".to_string()))
            .await
            .unwrap());
    }
}
