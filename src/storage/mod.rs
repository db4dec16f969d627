//! Data persistence layer.
//!
//! One entity, [`Registration`], behind the [`RegistrationStore`] capability.
//! Records are created once and never updated or deleted.

pub mod local;
pub mod postgres;

pub use local::LocalStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("pool setup error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Stored registration (every column)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Registration without the user agent (for listings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    pub ip_address: Option<String>,
}

impl From<Registration> for RegistrationInfo {
    fn from(r: Registration) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            registered_at: r.registered_at,
            ip_address: r.ip_address,
        }
    }
}

/// Fields of a registration about to be inserted.
///
/// `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub full_name: String,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub registered_at: DateTime<Utc>,
}

// ============================================================================
// STORE CAPABILITY
// ============================================================================

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Id of the registration holding `email`, if any
    async fn find_by_email(&self, email: &str) -> Result<Option<i64>>;

    /// Insert unless `email` is already taken; `None` on conflict.
    async fn insert_if_absent(&self, registration: &NewRegistration)
        -> Result<Option<Registration>>;

    /// Every registration, newest first
    async fn list_all(&self) -> Result<Vec<RegistrationInfo>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Registration>>;

    async fn count_all(&self) -> Result<i64>;

    /// Registrations with `registered_at >= since`
    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64>;
}
