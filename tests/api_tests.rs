//! HTTP-level tests for the registration API.

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use event_registration::api::ApiState;
use event_registration::{
    router, Clock, LocalStorage, MockClock, RateLimitConfig, RateLimiter, RegistrationPipeline,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    pipeline: Arc<RegistrationPipeline>,
    clock: MockClock,
    trust_proxy: bool,
}

impl TestApp {
    fn new(rate_limit: RateLimitConfig) -> Self {
        Self::build(rate_limit, false)
    }

    fn build(rate_limit: RateLimitConfig, trust_proxy: bool) -> Self {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 11, 2, 14, 30, 0).unwrap());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(LocalStorage::in_memory().unwrap());
        let limiter = Arc::new(RateLimiter::new(rate_limit, shared.clone()));
        Self {
            pipeline: Arc::new(RegistrationPipeline::new(store, limiter, shared)),
            clock,
            trust_proxy,
        }
    }

    fn router_from(&self, peer: &str) -> Router {
        let addr: SocketAddr = peer.parse().unwrap();
        let state = Arc::new(ApiState::new(self.pipeline.clone(), self.trust_proxy));
        router(state).layer(MockConnectInfo(addr))
    }

    async fn send(&self, peer: &str, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router_from(peer).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    async fn register(&self, peer: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "integration-test")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, bytes) = self.send(peer, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let (status, _, bytes) = self.send("127.0.0.1:4000", request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

fn default_app() -> TestApp {
    TestApp::new(RateLimitConfig::new(15 * 60 * 1000, 5))
}

fn jane() -> Value {
    json!({"fullName": "Jane Doe", "email": "jane@example.com"})
}

#[tokio::test]
async fn test_register_then_duplicate_then_stats() {
    let app = default_app();

    let (status, body) = app.register("10.0.0.1:5000", jane()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Registration successful");
    assert_eq!(body["data"]["email"], "jane@example.com");
    assert_eq!(body["data"]["fullName"], "Jane Doe");
    assert!(body["data"]["id"].is_i64());
    assert!(body["data"]["registeredAt"].is_string());

    let (status, body) = app.register("10.0.0.1:5000", jane()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = app.get_json("/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"], json!({"total": 1, "today": 1}));
}

#[tokio::test]
async fn test_validation_errors_are_listed() {
    let app = default_app();

    let (status, body) = app
        .register("10.0.0.1:5000", json!({"fullName": "J@ne", "email": "not-an-email"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(
        body["details"],
        json!([
            {"field": "fullName", "message": "Name contains invalid characters"},
            {"field": "email", "message": "Invalid email format"}
        ])
    );

    let (_, body) = app.get_json("/registrations").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_missing_and_malformed_bodies_fail_validation() {
    let app = default_app();

    let (status, body) = app.register("10.0.0.1:5000", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"fullName"));
    assert!(fields.contains(&"email"));

    let request = Request::post("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, headers, _) = app.send("10.0.0.1:5000", request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers["ratelimit-remaining"], "3");
}

#[tokio::test]
async fn test_rate_limit_blocks_then_recovers() {
    let app = TestApp::new(RateLimitConfig::new(60_000, 2));

    let (status, _) = app.register("10.0.0.1:5000", json!({"fullName": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.register("10.0.0.1:5001", jane()).await;
    assert_eq!(status, StatusCode::CREATED);

    let request = Request::post("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"fullName": "John Doe", "email": "john@example.com"}).to_string(),
        ))
        .unwrap();
    let (status, headers, bytes) = app.send("10.0.0.1:5002", request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "60");
    assert_eq!(headers["ratelimit-limit"], "2");
    assert_eq!(headers["ratelimit-remaining"], "0");
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Too many requests");

    // Different client address is unaffected
    let (status, _) = app
        .register(
            "10.0.0.2:5000",
            json!({"fullName": "John Doe", "email": "john@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    app.clock.advance(Duration::seconds(60));
    let (status, _) = app
        .register(
            "10.0.0.1:5000",
            json!({"fullName": "Ann Lee", "email": "ann@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_forwarded_for_used_only_behind_trusted_proxy() {
    let app = TestApp::build(RateLimitConfig::new(60_000, 1), true);

    for (i, client) in ["203.0.113.7", "203.0.113.8"].iter().enumerate() {
        let request = Request::post("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", format!("{}, 10.0.0.254", client))
            .body(Body::from(
                json!({"fullName": "Jane Doe", "email": format!("jane{}@example.com", i)})
                    .to_string(),
            ))
            .unwrap();
        let (status, _, _) = app.send("10.0.0.254:443", request).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app.get_json("/registrations").await;
    let ips: Vec<&str> = body["registrations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ip_address"].as_str().unwrap())
        .collect();
    assert_eq!(ips, vec!["203.0.113.8", "203.0.113.7"]);
}

#[tokio::test]
async fn test_list_and_get_registrations() {
    let app = default_app();

    app.register("10.0.0.1:5000", jane()).await;
    app.clock.advance(Duration::minutes(3));
    let (_, created) = app
        .register(
            "10.0.0.1:5000",
            json!({"fullName": "John Smith", "email": "John@Example.com"}),
        )
        .await;

    let (status, body) = app.get_json("/registrations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    let registrations = body["registrations"].as_array().unwrap();
    assert_eq!(registrations[0]["email"], "john@example.com");
    assert_eq!(registrations[1]["email"], "jane@example.com");
    assert_eq!(registrations[0]["ip_address"], "10.0.0.1");
    assert!(registrations[0].get("user_agent").is_none());

    let id = created["data"]["id"].as_i64().unwrap();
    let (status, body) = app.get_json(&format!("/registrations/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_name"], "John Smith");
    assert_eq!(body["data"]["user_agent"], "integration-test");

    let (status, body) = app.get_json("/registrations/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Registration not found");

    let (status, _) = app.get_json("/registrations/abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_csv() {
    let app = default_app();
    app.register("10.0.0.1:5000", jane()).await;

    let request = Request::get("/registrations/export")
        .body(Body::empty())
        .unwrap();
    let (status, headers, bytes) = app.send("127.0.0.1:4000", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"registrations_2024-11-02.csv\""
    );

    let csv = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "ID,Full Name,Email,Registered At,IP Address");
    assert!(lines[1].ends_with(r#""Jane Doe","jane@example.com","2024-11-02T14:30:00Z","10.0.0.1""#));
}

#[tokio::test]
async fn test_health() {
    let app = default_app();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, _, bytes) = app.send("127.0.0.1:4000", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"OK");
}
