//! Registration endpoints.
//!
//! - `POST /register`: public, rate-limited submission
//! - `GET /registrations`, `/registrations/:id`, `/registrations/export`, `/stats`:
//!   admin reads. No authentication here; access to these is restricted by
//!   the fronting proxy.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::api::{ApiError, ApiState};
use crate::pipeline::{RegistrationStats, SubmitRequest};
use crate::rate_limit::RateDecision;
use crate::storage::{Registration, RegistrationInfo};

// ============================================================================
// SUBMISSION
// ============================================================================

/// Missing fields deserialize as empty strings so they fail validation
/// with field errors instead of a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSummary {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
}

impl From<Registration> for RegistrationSummary {
    fn from(r: Registration) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            registered_at: r.registered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub data: RegistrationSummary,
}

/// POST /register - Submit a registration
///
/// Every attempt counts against the client's rate limit, including
/// attempts whose body is not valid JSON (treated as empty fields).
pub async fn register(
    State(state): State<Arc<ApiState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Unreadable registration body: {}", rejection);
            RegisterRequest::default()
        }
    };

    let request = SubmitRequest {
        full_name: body.full_name,
        email: body.email,
        ip_address: state.client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let outcome = state.pipeline.submit(request).await;
    let mut response = match outcome.result {
        Ok(registration) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                success: true,
                message: "Registration successful".to_string(),
                data: registration.into(),
            }),
        )
            .into_response(),
        Err(e) => ApiError::from_registration(e, "Registration failed").into_response(),
    };

    insert_rate_headers(response.headers_mut(), &outcome.rate);
    response
}

fn insert_rate_headers(headers: &mut HeaderMap, rate: &RateDecision) {
    headers.insert("ratelimit-limit", HeaderValue::from(rate.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(rate.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(rate.reset_after_secs()));
}

// ============================================================================
// ADMIN READS
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ListRegistrationsResponse {
    pub success: bool,
    pub count: usize,
    pub registrations: Vec<RegistrationInfo>,
}

/// GET /registrations - Every registration, newest first
pub async fn list_registrations(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ListRegistrationsResponse>, ApiError> {
    let registrations = state
        .pipeline
        .list_all()
        .await
        .map_err(|e| ApiError::from_registration(e, "Failed to fetch registrations"))?;

    Ok(Json(ListRegistrationsResponse {
        success: true,
        count: registrations.len(),
        registrations,
    }))
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub success: bool,
    pub data: Registration,
}

/// GET /registrations/:id - A single registration with every column
///
/// Ids that are not integers cannot exist and answer 404.
pub async fn get_registration(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let failure = "Failed to fetch registration";
    let id: i64 = id.parse().map_err(|_| ApiError::not_found())?;

    let registration = state
        .pipeline
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::from_registration(e, failure))?;

    Ok(Json(RegistrationResponse {
        success: true,
        data: registration,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: RegistrationStats,
}

/// GET /stats - Total registrations and registrations today (UTC)
pub async fn get_stats(State(state): State<Arc<ApiState>>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state
        .pipeline
        .stats()
        .await
        .map_err(|e| ApiError::from_registration(e, "Failed to fetch statistics"))?;

    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

/// GET /registrations/export - CSV download of every registration
pub async fn export_registrations(
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, ApiError> {
    let (filename, csv) = state
        .pipeline
        .export_csv()
        .await
        .map_err(|e| ApiError::from_registration(e, "Failed to export registrations"))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    ))
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
