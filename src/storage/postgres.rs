//! PostgreSQL Storage
//!
//! Production registration storage. Uniqueness of `email` is enforced by the
//! schema, so concurrent submissions of one address insert at most one row.

use super::{NewRegistration, Registration, RegistrationInfo, RegistrationStore, Result};
use crate::config::redact_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS registrations (
    id BIGSERIAL PRIMARY KEY,
    full_name VARCHAR(100) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    ip_address TEXT,
    user_agent TEXT,
    registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_registrations_registered_at ON registrations(registered_at DESC);
"#;

#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
}

impl PgStorage {
    /// Create storage from a connection URL and apply the schema
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut config = Config::new();
        config.url = Some(database_url.to_string());
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        // Test connection
        let client = pool.get().await?;
        info!("Connected to PostgreSQL at {}", redact_url(database_url));

        client.batch_execute(SCHEMA).await?;
        info!("Database schema initialized");

        Ok(Self { pool })
    }
}

fn registration_from_row(r: &Row) -> Registration {
    Registration {
        id: r.get(0),
        full_name: r.get(1),
        email: r.get(2),
        ip_address: r.get(3),
        user_agent: r.get(4),
        registered_at: r.get(5),
    }
}

#[async_trait]
impl RegistrationStore for PgStorage {
    async fn find_by_email(&self, email: &str) -> Result<Option<i64>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT id FROM registrations WHERE email = $1", &[&email])
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn insert_if_absent(
        &self,
        registration: &NewRegistration,
    ) -> Result<Option<Registration>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "INSERT INTO registrations (full_name, email, ip_address, user_agent, registered_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (email) DO NOTHING
                 RETURNING id, full_name, email, ip_address, user_agent, registered_at",
                &[
                    &registration.full_name,
                    &registration.email,
                    &registration.ip_address,
                    &registration.user_agent,
                    &registration.registered_at,
                ],
            )
            .await?;

        let stored = row.as_ref().map(registration_from_row);
        match &stored {
            Some(r) => debug!("Stored registration {}", r.id),
            None => debug!("Insert skipped, email already registered"),
        }
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<RegistrationInfo>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, full_name, email, registered_at, ip_address
                 FROM registrations ORDER BY registered_at DESC, id DESC",
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| RegistrationInfo {
                id: r.get(0),
                full_name: r.get(1),
                email: r.get(2),
                registered_at: r.get(3),
                ip_address: r.get(4),
            })
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Registration>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, full_name, email, ip_address, user_agent, registered_at
                 FROM registrations WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(registration_from_row))
    }

    async fn count_all(&self) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM registrations", &[])
            .await?;
        Ok(row.get(0))
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM registrations WHERE registered_at >= $1",
                &[&since],
            )
            .await?;
        Ok(row.get(0))
    }
}
