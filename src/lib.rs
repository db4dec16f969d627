//! Event Registration Service
//!
//! Backend for an event sign-up form with a small admin surface.
//! Submissions are rate limited per client address, validated, checked for
//! duplicate emails and stored; admin endpoints list, fetch, export and
//! count registrations.
//!
//! ## Module Structure
//!
//! - `config`: Service and rate limit configuration
//! - `clock`: Injectable time source
//! - `rate_limit`: Per-client fixed-window limiter
//! - `validation`: Field rules and email normalization
//! - `storage`: Registration store trait, PostgreSQL and SQLite backends
//! - `pipeline`: Submission flow and admin reads
//! - `export`: CSV rendering
//! - `api`: HTTP handlers and error mapping
//! - `server`: Router assembly and startup

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod rate_limit;
pub mod server;
pub mod storage;
pub mod validation;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{RateLimitConfig, ServerConfig};
pub use error::RegistrationError;
pub use pipeline::{RegistrationPipeline, RegistrationStats, SubmitOutcome, SubmitRequest};
pub use rate_limit::{RateDecision, RateLimiter};
pub use server::{router, run_server};
pub use storage::{
    LocalStorage, NewRegistration, PgStorage, Registration, RegistrationInfo, RegistrationStore,
    StorageError,
};
pub use validation::{validate_registration, FieldError, NormalizedRegistration};
