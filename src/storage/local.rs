//! Local SQLite Storage
//!
//! Single-node registration storage used when no PostgreSQL URL is
//! configured, and by the test suite (in-memory).
//!
//! Timestamps are stored as Unix milliseconds.

use super::{NewRegistration, Registration, RegistrationInfo, RegistrationStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS registrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    ip_address TEXT,
    user_agent TEXT,
    registered_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_registrations_registered_at ON registrations(registered_at DESC);
"#;

#[derive(Clone)]
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    /// Open (or create) storage at the specified path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Local storage initialized at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create in-memory storage (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn from_millis(column: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
}

#[async_trait]
impl RegistrationStore for LocalStorage {
    async fn find_by_email(&self, email: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT id FROM registrations WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    async fn insert_if_absent(
        &self,
        registration: &NewRegistration,
    ) -> Result<Option<Registration>> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO registrations (full_name, email, ip_address, user_agent, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(email) DO NOTHING",
            params![
                registration.full_name,
                registration.email,
                registration.ip_address,
                registration.user_agent,
                registration.registered_at.timestamp_millis(),
            ],
        )?;

        if inserted == 0 {
            debug!("Insert skipped, email already registered");
            return Ok(None);
        }

        let id = conn.last_insert_rowid();
        debug!("Stored registration {}", id);

        // Round-trip through the stored precision
        let registered_at = from_millis(5, registration.registered_at.timestamp_millis())?;
        Ok(Some(Registration {
            id,
            full_name: registration.full_name.clone(),
            email: registration.email.clone(),
            ip_address: registration.ip_address.clone(),
            user_agent: registration.user_agent.clone(),
            registered_at,
        }))
    }

    async fn list_all(&self) -> Result<Vec<RegistrationInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, full_name, email, registered_at, ip_address
             FROM registrations ORDER BY registered_at DESC, id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RegistrationInfo {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                registered_at: from_millis(3, row.get(3)?)?,
                ip_address: row.get(4)?,
            })
        })?;

        let registrations = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(registrations)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Registration>> {
        let conn = self.conn.lock();
        let registration = conn
            .query_row(
                "SELECT id, full_name, email, ip_address, user_agent, registered_at
                 FROM registrations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Registration {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                        email: row.get(2)?,
                        ip_address: row.get(3)?,
                        user_agent: row.get(4)?,
                        registered_at: from_millis(5, row.get(5)?)?,
                    })
                },
            )
            .optional()?;
        Ok(registration)
    }

    async fn count_all(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM registrations", [], |row| row.get(0))?;
        Ok(count)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM registrations WHERE registered_at >= ?1",
            params![since.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
