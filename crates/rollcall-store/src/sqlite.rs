//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use rollcall_core::{
    AuditEvent, AuditKind, FacilityId, PasswordHash, Principal, PrincipalId, Role,
    SessionIdentityState, SessionToken,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    AuditSink, Credential, CredentialStore, SessionRecord, SessionStore, SwapResult,
};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn id_to_sql(id: PrincipalId) -> Result<i64> {
    i64::try_from(id.get())
        .map_err(|_| StoreError::InvalidData(format!("principal id out of range: {}", id)))
}

fn id_from_sql(idx: usize, value: i64) -> rusqlite::Result<PrincipalId> {
    u64::try_from(value)
        .map(PrincipalId)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn encode_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: serde::de::DeserializeOwned>(idx: usize, bytes: &[u8]) -> rusqlite::Result<T> {
    ciborium::from_reader(bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, e.to_string().into())
    })
}

const PRINCIPAL_COLUMNS: &str = "id, display_name, role, home_role, facilities, active";

fn row_to_principal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Principal> {
    let facilities: Vec<u8> = row.get("facilities")?;
    let facilities: Vec<FacilityId> = decode_cbor(4, &facilities)?;

    Ok(Principal {
        id: id_from_sql(0, row.get("id")?)?,
        display_name: row.get("display_name")?,
        role: Role::new(row.get::<_, String>("role")?),
        home_role: Role::new(row.get::<_, String>("home_role")?),
        facilities,
        active: row.get::<_, i64>("active")? != 0,
    })
}

fn select_principal(conn: &Connection, id: i64) -> Result<Option<Principal>> {
    conn.query_row(
        &format!("SELECT {} FROM principals WHERE id = ?1", PRINCIPAL_COLUMNS),
        params![id],
        row_to_principal,
    )
    .optional()
    .map_err(StoreError::from)
}

/// Raw session columns, before the identity invariant is checked.
struct SessionRow {
    active: PrincipalId,
    original: Option<PrincipalId>,
    impersonating: bool,
    created_at: i64,
    expires_at: i64,
}

impl SessionRow {
    fn into_record(self) -> Result<SessionRecord> {
        let state =
            SessionIdentityState::from_parts(self.active, self.original, self.impersonating)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(SessionRecord {
            state,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    let original: Option<i64> = row.get("original_principal_id")?;
    Ok(SessionRow {
        active: id_from_sql(0, row.get("active_principal_id")?)?,
        original: original.map(|v| id_from_sql(1, v)).transpose()?,
        impersonating: row.get::<_, i64>("is_impersonating")? != 0,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}

fn select_session(conn: &Connection, token: &SessionToken) -> Result<Option<SessionRecord>> {
    conn.query_row(
        "SELECT active_principal_id, original_principal_id, is_impersonating,
                created_at, expires_at
         FROM sessions WHERE token = ?1",
        params![token.as_bytes().as_slice()],
        row_to_session,
    )
    .optional()?
    .map(SessionRow::into_record)
    .transpose()
}

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let kind: String = row.get("kind")?;
    let kind = AuditKind::from_name(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("unknown audit kind: {}", kind).into(),
        )
    })?;
    let actor: Option<i64> = row.get("actor_principal_id")?;
    let target: Option<i64> = row.get("target_principal_id")?;
    let metadata: Vec<u8> = row.get("metadata")?;

    Ok(AuditEvent {
        kind,
        actor_principal_id: actor.map(|v| id_from_sql(1, v)).transpose()?,
        target_principal_id: target.map(|v| id_from_sql(2, v)).transpose()?,
        timestamp: row.get("timestamp")?,
        metadata: decode_cbor(4, &metadata)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, token: &SessionToken, record: &SessionRecord) -> Result<()> {
        let token = *token;
        let record = *record;
        let active = id_to_sql(record.state.active())?;
        let original = record.state.original().map(id_to_sql).transpose()?;

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO sessions (
                    token, active_principal_id, original_principal_id,
                    is_impersonating, created_at, expires_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    token.as_bytes().as_slice(),
                    active,
                    original,
                    record.state.is_impersonating() as i64,
                    record.created_at,
                    record.expires_at,
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::DuplicateSession);
            }
            Ok(())
        })
        .await
    }

    async fn get_session(&self, token: &SessionToken, now: i64) -> Result<Option<SessionRecord>> {
        let token = *token;

        self.run(move |conn| {
            Ok(select_session(conn, &token)?.filter(|r| !r.is_expired(now)))
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        token: &SessionToken,
        expected: &SessionIdentityState,
        new: &SessionIdentityState,
        now: i64,
    ) -> Result<SwapResult> {
        let token = *token;
        let expected = *expected;
        let new = *new;
        let active = id_to_sql(new.active())?;
        let original = new.original().map(id_to_sql).transpose()?;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let result = match select_session(&tx, &token)?.filter(|r| !r.is_expired(now)) {
                None => SwapResult::Missing,
                Some(record) if record.state != expected => SwapResult::Mismatch {
                    current: record.state,
                },
                Some(_) => {
                    tx.execute(
                        "UPDATE sessions
                         SET active_principal_id = ?2,
                             original_principal_id = ?3,
                             is_impersonating = ?4
                         WHERE token = ?1",
                        params![
                            token.as_bytes().as_slice(),
                            active,
                            original,
                            new.is_impersonating() as i64,
                        ],
                    )?;
                    SwapResult::Swapped
                }
            };

            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn delete_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
        let token = *token;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let existing = select_session(&tx, &token)?;
            tx.execute(
                "DELETE FROM sessions WHERE token = ?1",
                params![token.as_bytes().as_slice()],
            )?;
            tx.commit()?;
            Ok(existing)
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<u64> {
        self.run(move |conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
            Ok(removed as u64)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert_principal(
        &self,
        username: &str,
        password: &PasswordHash,
        principal: &Principal,
    ) -> Result<()> {
        let username = username.to_string();
        let encoded_hash = password.encode();
        let principal = principal.clone();
        let id = id_to_sql(principal.id)?;
        let facilities = encode_cbor(&principal.facilities)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let username_taken: Option<i64> = tx
                .query_row(
                    "SELECT principal_id FROM credentials WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()?;
            if username_taken.is_some() {
                return Err(StoreError::DuplicateUsername(username));
            }

            let id_taken: Option<i64> = tx
                .query_row("SELECT id FROM principals WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })
                .optional()?;
            if id_taken.is_some() {
                return Err(StoreError::DuplicatePrincipal(principal.id.get()));
            }

            tx.execute(
                "INSERT INTO principals (id, display_name, role, home_role, facilities, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    principal.display_name,
                    principal.role.as_str(),
                    principal.home_role.as_str(),
                    facilities,
                    principal.active as i64,
                ],
            )?;
            tx.execute(
                "INSERT INTO credentials (username, principal_id, password_hash)
                 VALUES (?1, ?2, ?3)",
                params![username, id, encoded_hash],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>> {
        let username = username.to_string();

        self.run(move |conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT principal_id, password_hash FROM credentials WHERE username = ?1",
                    params![username],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(id, encoded)| -> Result<Credential> {
                let password = PasswordHash::decode(&encoded)
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                Ok(Credential {
                    principal_id: id_from_sql(0, id)?,
                    password,
                })
            })
            .transpose()
        })
        .await
    }

    async fn get_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        let id = id_to_sql(id)?;
        self.run(move |conn| select_principal(conn, id)).await
    }

    async fn set_role(&self, id: PrincipalId, role: &Role) -> Result<Option<Principal>> {
        let id = id_to_sql(id)?;
        let role = role.as_str().to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE principals SET role = ?2 WHERE id = ?1",
                params![id, role],
            )?;
            let principal = if changed == 0 {
                None
            } else {
                select_principal(&tx, id)?
            };
            tx.commit()?;
            Ok(principal)
        })
        .await
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> Result<Option<Principal>> {
        let id = id_to_sql(id)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE principals SET active = ?2 WHERE id = ?1",
                params![id, active as i64],
            )?;
            let principal = if changed == 0 {
                None
            } else {
                select_principal(&tx, id)?
            };
            tx.commit()?;
            Ok(principal)
        })
        .await
    }

    async fn next_principal_id(&self) -> Result<PrincipalId> {
        self.run(|conn| {
            let max: i64 =
                conn.query_row("SELECT COALESCE(MAX(id), 0) FROM principals", [], |row| {
                    row.get(0)
                })?;
            id_from_sql(0, max + 1).map_err(StoreError::from)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AuditSink for SqliteStore {
    async fn append_audit(&self, event: &AuditEvent) -> Result<()> {
        let kind = event.kind.as_str();
        let actor = event.actor_principal_id.map(id_to_sql).transpose()?;
        let target = event.target_principal_id.map(id_to_sql).transpose()?;
        let timestamp = event.timestamp;
        let metadata = encode_cbor(&event.metadata)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO audit_events (
                    kind, actor_principal_id, target_principal_id, timestamp, metadata
                ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![kind, actor, target, timestamp, metadata],
            )?;
            Ok(())
        })
        .await
    }

    async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, actor_principal_id, target_principal_id, timestamp, metadata
                 FROM audit_events ORDER BY seq DESC LIMIT ?1",
            )?;
            let mut events = stmt
                .query_map(params![limit], row_to_audit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            events.reverse();
            Ok(events)
        })
        .await
    }
}
