//! Error types for the registration pipeline

use crate::storage::StorageError;
use crate::validation::FieldError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Terminal outcomes of a registration request other than success.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Rate limited: retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration, limit: u32 },

    #[error("Validation failed: {} field error(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Registration {0} not found")]
    NotFound(i64),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistrationError::RateLimited {
            retry_after: Duration::from_secs(90),
            limit: 5,
        };
        assert_eq!(err.to_string(), "Rate limited: retry after 90s");

        let err = RegistrationError::ValidationFailed(vec![
            FieldError::new("email", "Email is required"),
            FieldError::new("email", "Invalid email format"),
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 field error(s)");

        assert_eq!(
            RegistrationError::NotFound(7).to_string(),
            "Registration 7 not found"
        );
    }

    #[test]
    fn test_from_storage_error() {
        let err: RegistrationError = StorageError::InvalidData("bad row".to_string()).into();
        assert!(matches!(err, RegistrationError::PersistenceFailed(_)));
        assert_eq!(err.to_string(), "Persistence failed: invalid data: bad row");
    }
}
