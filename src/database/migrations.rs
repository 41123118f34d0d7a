//! Database migrations for casegate
//!
//! This module contains SQL migrations for the SQLite credential schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
-- Identities with credentials
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    phone TEXT UNIQUE,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'citizen',
    permissions TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'active',
    organization TEXT,
    badge_number TEXT,
    email_verified INTEGER NOT NULL DEFAULT 0,
    phone_verified INTEGER NOT NULL DEFAULT 0,
    verification_token TEXT,
    last_login_at DATETIME,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    CHECK (role IN ('admin', 'police', 'dci', 'ngo', 'investigator', 'citizen')),
    CHECK (status IN ('active', 'suspended', 'pending'))
);

CREATE INDEX IF NOT EXISTS idx_users_status ON users(status);
CREATE INDEX IF NOT EXISTS idx_users_verification ON users(verification_token);
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn insert_user(conn: &Connection, id: &str, email: &str, phone: Option<&str>) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO users (id, email, phone, password_hash, first_name, last_name) VALUES (?1, ?2, ?3, 'h', 'Ann', 'Lee')",
            rusqlite::params![id, email, phone],
        )
    }

    #[test]
    fn test_create_schema_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"users".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
    }

    #[test]
    fn test_users_email_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        insert_user(&conn, "u1", "a@b.com", None).unwrap();
        assert!(insert_user(&conn, "u2", "a@b.com", None).is_err());
    }

    #[test]
    fn test_users_phone_unique_but_nullable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        insert_user(&conn, "u1", "a@b.com", None).unwrap();
        insert_user(&conn, "u2", "c@d.com", None).unwrap();
        insert_user(&conn, "u3", "e@f.com", Some("+254700000001")).unwrap();
        assert!(insert_user(&conn, "u4", "g@h.com", Some("+254700000001")).is_err());
    }

    #[test]
    fn test_users_role_check() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role) VALUES ('u1', 'a@b.com', 'h', 'A', 'B', 'root')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_migration_version() {
        assert_eq!(migration_version(), 1);
    }
}
