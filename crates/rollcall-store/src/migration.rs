//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use rollcall_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Principals: immutable-snapshot source for identity resolution
        CREATE TABLE principals (
            id INTEGER PRIMARY KEY,           -- PrincipalId
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,               -- current role, may be switched
            home_role TEXT NOT NULL,          -- role assigned at provisioning
            facilities BLOB NOT NULL,         -- CBOR array of facility ids
            active INTEGER NOT NULL DEFAULT 1
        );

        -- Credentials: one username per principal
        CREATE TABLE credentials (
            username TEXT PRIMARY KEY,
            principal_id INTEGER NOT NULL UNIQUE REFERENCES principals(id),
            password_hash TEXT NOT NULL       -- b3$<salt>$<digest>
        );

        -- Sessions: exactly one identity state per token
        CREATE TABLE sessions (
            token BLOB PRIMARY KEY,           -- 32 bytes
            active_principal_id INTEGER NOT NULL,
            original_principal_id INTEGER,    -- NULL unless impersonating
            is_impersonating INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,

            CHECK (
                (is_impersonating = 0 AND original_principal_id IS NULL)
                OR (is_impersonating = 1
                    AND original_principal_id IS NOT NULL
                    AND original_principal_id != active_principal_id)
            )
        );

        -- Audit trail: append-only
        CREATE TABLE audit_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            actor_principal_id INTEGER,
            target_principal_id INTEGER,
            timestamp INTEGER NOT NULL,
            metadata BLOB NOT NULL            -- CBOR map of string -> string
        );

        CREATE INDEX idx_sessions_expires ON sessions(expires_at);
        CREATE INDEX idx_audit_actor ON audit_events(actor_principal_id);
        CREATE INDEX idx_audit_timestamp ON audit_events(timestamp);
        "#,
    )?;

    Ok(())
}
