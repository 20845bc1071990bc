//! Process-wide admission control.
//!
//! One token bucket shared by every request. The liveness and metrics
//! endpoints bypass it so they can never be starved by proxied traffic.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RateLimitConfig;
use crate::observability::Telemetry;

/// Paths that are never subject to admission control.
pub const EXEMPT_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Seconds a rejected caller is told to wait. Not derived from bucket state.
pub const RETRY_AFTER_SECS: u64 = 60;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// The admission gate: refill is computed from elapsed time, never waited on.
#[derive(Debug)]
pub struct AdmissionGate {
    bucket: Mutex<TokenBucket>,
    /// Tokens per second.
    refill_rate: f64,
    burst: f64,
}

impl AdmissionGate {
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        let refill_rate = f64::from(requests_per_minute) / 60.0;
        let burst = f64::from(burst_size);
        tracing::info!(
            rate_per_sec = refill_rate,
            burst = burst_size,
            "Rate limiter initialized"
        );
        Self {
            bucket: Mutex::new(TokenBucket::new(burst, Instant::now())),
            refill_rate,
            burst,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_minute, config.burst_size)
    }

    /// Try to consume one token.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(self.burst, self.refill_rate, now)
    }
}

/// Returns true when `path` bypasses admission control.
pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

/// State for the admission middleware.
#[derive(Clone)]
pub struct AdmissionState {
    pub gate: Arc<AdmissionGate>,
    pub telemetry: Arc<dyn Telemetry>,
}

/// Middleware function for process-wide rate limiting.
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) || state.gate.allow() {
        return next.run(request).await;
    }

    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        "Rate limit exceeded"
    );
    state.telemetry.record_rate_limited();

    let mut response = (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    response
}
