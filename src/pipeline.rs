//! Registration Pipeline
//!
//! Orchestrates the public submission flow and the admin read paths:
//!
//! ```text
//! submit:  RateLimiter -> Validator -> duplicate check -> insert
//! reads:   list_all | get_by_id | stats | export_csv   (no limiter, no validator)
//! ```
//!
//! Steps of one submission run strictly in that order and the insert is the
//! only write. A submission never reaches the store unless every earlier
//! gate passed.

use crate::clock::{start_of_day, Clock};
use crate::error::{RegistrationError, Result};
use crate::export;
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::storage::{NewRegistration, Registration, RegistrationInfo, RegistrationStore};
use crate::validation::validate_registration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Rate limit key for requests whose origin address is unknown
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Raw submission as received from a client
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub full_name: String,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of one submission attempt and the limiter state it left behind
#[derive(Debug)]
pub struct SubmitOutcome {
    pub rate: RateDecision,
    pub result: Result<Registration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStats {
    pub total: i64,
    pub today: i64,
}

pub struct RegistrationPipeline {
    store: Arc<dyn RegistrationStore>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl RegistrationPipeline {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            limiter,
            clock,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    // ========================================================================
    // SUBMIT
    // ========================================================================

    pub async fn submit(&self, request: SubmitRequest) -> SubmitOutcome {
        let client_key = request.ip_address.as_deref().unwrap_or(UNKNOWN_CLIENT);
        let rate = self.limiter.check(client_key);
        if !rate.allowed {
            warn!("Rate limit exceeded for {}", client_key);
            return SubmitOutcome {
                rate,
                result: Err(RegistrationError::RateLimited {
                    retry_after: rate.reset_after,
                    limit: rate.limit,
                }),
            };
        }

        let result = self.register(request).await;
        SubmitOutcome { rate, result }
    }

    async fn register(&self, request: SubmitRequest) -> Result<Registration> {
        let valid = validate_registration(&request.full_name, &request.email)
            .map_err(RegistrationError::ValidationFailed)?;

        let existing = self
            .store
            .find_by_email(&valid.email)
            .await
            .map_err(|e| persistence_failed("duplicate check", e))?;
        if existing.is_some() {
            warn!("Duplicate registration attempt for {}", valid.email);
            return Err(RegistrationError::DuplicateEmail);
        }

        let new_registration = NewRegistration {
            full_name: valid.full_name,
            email: valid.email,
            ip_address: request.ip_address,
            user_agent: request.user_agent,
            registered_at: self.clock.now(),
        };

        // A concurrent submission may have taken the address since the check
        match self.store.insert_if_absent(&new_registration).await {
            Ok(Some(registration)) => {
                info!(
                    "New registration {}: {}",
                    registration.id, registration.email
                );
                Ok(registration)
            }
            Ok(None) => {
                warn!(
                    "Registration for {} lost an insert race",
                    new_registration.email
                );
                Err(RegistrationError::DuplicateEmail)
            }
            Err(e) => Err(persistence_failed("insert", e)),
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Every registration, newest first
    pub async fn list_all(&self) -> Result<Vec<RegistrationInfo>> {
        self.store
            .list_all()
            .await
            .map_err(|e| persistence_failed("list registrations", e))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Registration> {
        self.store
            .get_by_id(id)
            .await
            .map_err(|e| persistence_failed("fetch registration", e))?
            .ok_or(RegistrationError::NotFound(id))
    }

    /// Total registrations and those since midnight UTC
    pub async fn stats(&self) -> Result<RegistrationStats> {
        let total = self
            .store
            .count_all()
            .await
            .map_err(|e| persistence_failed("count registrations", e))?;
        let today = self
            .store
            .count_since(start_of_day(self.clock.now()))
            .await
            .map_err(|e| persistence_failed("count today's registrations", e))?;
        Ok(RegistrationStats { total, today })
    }

    /// CSV export of every registration along with its download filename
    pub async fn export_csv(&self) -> Result<(String, String)> {
        let registrations = self.list_all().await?;
        let filename = export::export_filename(self.clock.now().date_naive());
        Ok((filename, export::render_csv(&registrations)))
    }
}

fn persistence_failed(operation: &str, err: crate::storage::StorageError) -> RegistrationError {
    error!("Storage failure during {}: {}", operation, err);
    RegistrationError::PersistenceFailed(err)
}
