//! SQLite implementation of the CredentialStore trait
//!
//! This module provides a SQLite-based implementation of the CredentialStore
//! trait using rusqlite and tokio-rusqlite for async operations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::CredentialStore;
use crate::error::DbError;
use crate::models::{AccountStatus, Credentials, Identity, NewIdentity};

const IDENTITY_COLUMNS: &str = "id, email, phone, first_name, last_name, role, permissions, \
     status, organization, badge_number, email_verified, phone_verified, last_login_at, \
     created_at";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }

    /// Run a closure with exclusive access to the connection
    ///
    /// Used by seeding code and tests that need direct SQL access.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(Into::into)
    }

    async fn query_identity(
        &self,
        filter: &'static str,
        value: String,
    ) -> Result<Option<Identity>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM users WHERE {} = ?1", IDENTITY_COLUMNS, filter);
                let identity = conn
                    .query_row(&sql, [&value], identity_from_row)
                    .optional()?;
                Ok(identity)
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl CredentialStore for SqliteDatabase {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, DbError> {
        self.query_identity("id", id.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DbError> {
        self.query_identity("email", email.to_string()).await
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {}, password_hash FROM users WHERE email = ?1",
                    IDENTITY_COLUMNS
                );
                let credentials = conn
                    .query_row(&sql, [&email], |row| {
                        Ok(Credentials {
                            identity: identity_from_row(row)?,
                            password_hash: row.get(14)?,
                        })
                    })
                    .optional()?;
                Ok(credentials)
            })
            .await
            .map_err(Into::into)
    }

    async fn email_or_phone_exists(
        &self,
        email: &str,
        phone: Option<String>,
    ) -> Result<bool, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE email = ?1 OR (?2 IS NOT NULL AND phone = ?2)",
                    rusqlite::params![email, phone],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Into::into)
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<Identity>, DbError> {
        self.query_identity("verification_token", token.to_string())
            .await
    }

    async fn create_identity(&self, identity: &NewIdentity) -> Result<Identity, DbError> {
        let new = identity.clone();
        let permissions = serde_json::to_string(&new.permissions)
            .map_err(|e| DbError::ConstraintViolation(e.to_string()))?;
        let created_at = Utc::now();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO users
                    (id, email, phone, password_hash, first_name, last_name, role, permissions,
                     status, organization, badge_number, verification_token, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?10, ?11, ?12, ?12)
                    "#,
                    rusqlite::params![
                        new.id,
                        new.email,
                        new.phone,
                        new.password_hash,
                        new.first_name,
                        new.last_name,
                        new.role.as_str(),
                        permissions,
                        new.organization,
                        new.badge_number,
                        new.verification_token,
                        created_at.to_rfc3339(),
                    ],
                )?;

                Ok(Identity {
                    id: new.id,
                    email: new.email,
                    phone: new.phone,
                    first_name: new.first_name,
                    last_name: new.last_name,
                    role: new.role,
                    permissions: new.permissions,
                    status: AccountStatus::Active,
                    organization: new.organization,
                    badge_number: new.badge_number,
                    email_verified: false,
                    phone_verified: false,
                    last_login_at: None,
                    created_at,
                })
            })
            .await
            .map_err(map_write_error)
    }

    async fn update_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        let id = id.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
                    rusqlite::params![at.to_rfc3339(), id],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn update_verification(
        &self,
        id: &str,
        email_verified: bool,
        token: Option<String>,
    ) -> Result<(), DbError> {
        let id = id.to_string();

        let updated = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(
                    r#"
                    UPDATE users
                    SET email_verified = ?1, verification_token = ?2, updated_at = ?3
                    WHERE id = ?4
                    "#,
                    rusqlite::params![email_verified, token, Utc::now().to_rfc3339(), id],
                )?;
                Ok(updated)
            })
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn update_status(&self, id: &str, status: AccountStatus) -> Result<(), DbError> {
        let id = id.to_string();

        let updated = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id],
                )?;
                Ok(updated)
            })
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Map a row selected with `IDENTITY_COLUMNS` into an Identity
fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    let role: String = row.get(5)?;
    let permissions: String = row.get(6)?;
    let status: String = row.get(7)?;

    Ok(Identity {
        id: row.get(0)?,
        email: row.get(1)?,
        phone: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: role.parse().map_err(|e: String| conversion_error(5, e))?,
        permissions: parse_permissions(&permissions)
            .map_err(|e| conversion_error(6, e.to_string()))?,
        status: status.parse().map_err(|e: String| conversion_error(7, e))?,
        organization: row.get(8)?,
        badge_number: row.get(9)?,
        email_verified: row.get(10)?,
        phone_verified: row.get(11)?,
        last_login_at: parse_datetime(row.get(12)?),
        created_at: parse_datetime(row.get(13)?).unwrap_or_else(Utc::now),
    })
}

fn parse_permissions(raw: &str) -> Result<BTreeSet<String>, serde_json::Error> {
    serde_json::from_str(raw)
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

/// Turn unique-constraint failures into `DbError::ConstraintViolation`
fn map_write_error(err: tokio_rusqlite::Error) -> DbError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, message))
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::ConstraintViolation(message.unwrap_or_else(|| code.to_string()))
        }
        other => other.into(),
    }
}

/// Parse datetime string from SQLite
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // SQLite's CURRENT_TIMESTAMP format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
