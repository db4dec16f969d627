//! Per-client submission rate limiting.
//!
//! Fixed-window counters keyed by client address. Every attempt counts,
//! whatever the outcome of the request, and an attempt whose post-increment
//! count exceeds the configured maximum is rejected. A window resets on the
//! first attempt after it has elapsed.

use crate::clock::Clock;
use crate::config::{RateLimitConfig, MAX_RATE_LIMIT_WINDOW_MS};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    started_at: DateTime<Utc>,
}

/// Outcome of one attempt against the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Attempts allowed per window
    pub limit: u32,
    /// Attempts left in the current window
    pub remaining: u32,
    /// Time until the current window ends
    pub reset_after: Duration,
}

impl RateDecision {
    /// Seconds until the window ends, rounded up.
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
    windows: DashMap<String, ClientWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        // Unvalidated configs are held to the same ceiling `validate` enforces
        let window_ms = config.window_ms.min(MAX_RATE_LIMIT_WINDOW_MS) as i64;
        let window = chrono::Duration::milliseconds(window_ms);
        Self {
            config,
            window,
            clock,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record an attempt from `client_key` and decide whether it may proceed.
    pub fn check(&self, client_key: &str) -> RateDecision {
        let now = self.clock.now();
        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert(ClientWindow {
                count: 0,
                started_at: now,
            });

        if now - entry.started_at >= self.window {
            entry.count = 0;
            entry.started_at = now;
        }
        entry.count = entry.count.saturating_add(1);

        let reset_after = entry
            .started_at
            .checked_add_signed(self.window)
            .and_then(|ends_at| (ends_at - now).to_std().ok())
            .unwrap_or_default();

        RateDecision {
            allowed: entry.count <= self.config.max_requests,
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(entry.count),
            reset_after,
        }
    }

    /// Drop counters whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now - window.started_at < self.window);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(
                "Purged {} expired rate limit windows, {} active",
                removed,
                self.windows.len()
            );
        }
        removed
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge expired windows until the task is aborted.
    pub fn spawn_purge_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                self.purge_expired();
            }
        })
    }
}
