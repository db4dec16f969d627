//! HTTP mapping of pipeline errors.
//!
//! Persistence failures are answered with the endpoint's generic failure
//! label only; the underlying cause has already been logged.

use crate::error::RegistrationError;
use crate::validation::FieldError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                success: false,
                error: error.to_string(),
                message,
                details: None,
            },
            retry_after: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Registration not found", None)
    }

    /// Map a pipeline error; `failure` labels a persistence failure of this endpoint.
    pub fn from_registration(err: RegistrationError, failure: &str) -> Self {
        match err {
            RegistrationError::RateLimited { retry_after, .. } => {
                let minutes = retry_after.as_millis().div_ceil(60_000).max(1);
                let unit = if minutes == 1 { "minute" } else { "minutes" };
                let mut api = Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests",
                    Some(format!(
                        "You have exceeded the registration limit. Please try again in {} {}.",
                        minutes, unit
                    )),
                );
                api.retry_after = Some(retry_after);
                api
            }
            RegistrationError::ValidationFailed(details) => {
                let mut api = Self::new(StatusCode::BAD_REQUEST, "Validation failed", None);
                api.body.details = Some(details);
                api
            }
            RegistrationError::DuplicateEmail => Self::new(
                StatusCode::CONFLICT,
                "Email already registered",
                Some("This email has already been used for registration.".to_string()),
            ),
            RegistrationError::NotFound(_) => Self::not_found(),
            RegistrationError::PersistenceFailed(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                failure,
                Some("An error occurred while processing your request.".to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(retry_after) = self.retry_after {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
