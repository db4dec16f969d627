//! API state shared across all endpoints.

use crate::pipeline::RegistrationPipeline;
use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct ApiState {
    pub pipeline: Arc<RegistrationPipeline>,
    /// Take the client address from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl ApiState {
    pub fn new(pipeline: Arc<RegistrationPipeline>, trust_proxy: bool) -> Self {
        Self {
            pipeline,
            trust_proxy,
        }
    }

    /// Originating client address of a request.
    ///
    /// The first `X-Forwarded-For` entry wins when the proxy is trusted,
    /// otherwise the TCP peer address is used.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
        if self.trust_proxy {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return Some(ip.to_string());
            }
        }
        peer.map(|addr| addr.ip().to_string())
    }
}
