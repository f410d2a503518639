//! Fixed-window rate limiting.
//!
//! Each key holds a counter and the instant its window resets. State lives
//! in process memory only; it is lost on restart and is not shared between
//! instances.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::validation::MAX_WINDOW_SECS;
use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Limit applied to one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Whole seconds until reset, rounded up so clients never retry early.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-key fixed-window counters.
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    cleanup_probability: f64,
}

impl FixedWindowLimiter {
    pub fn new(cleanup_probability: f64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            cleanup_probability,
        }
    }

    pub fn check(&self, key: &str, rule: RateLimitRule) -> RateLimitDecision {
        self.check_at(key, rule, Instant::now())
    }

    /// Count one request for `key` at `now`.
    pub fn check_at(&self, key: &str, rule: RateLimitRule, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if self.cleanup_probability > 0.0 && fastrand::f64() < self.cleanup_probability {
            Self::purge_locked(&mut windows, now);
        }

        let reset_at = window_end(now, rule.window);
        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at,
        });
        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = reset_at;
        }
        window.count = window.count.saturating_add(1);

        RateLimitDecision {
            allowed: window.count <= rule.max_requests,
            limit: rule.max_requests,
            remaining: rule.max_requests.saturating_sub(window.count),
            reset_after: window.reset_at.saturating_duration_since(now),
        }
    }

    /// Drop every window that has already reset.
    pub fn purge_expired(&self, now: Instant) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        Self::purge_locked(&mut windows, now);
    }

    fn purge_locked(windows: &mut HashMap<String, Window>, now: Instant) {
        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now);
        let removed = before - windows.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = windows.len(), "Purged expired rate-limit windows");
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// End of a window opened at `now`. Windows too long to represent are cut
/// to the longest configurable window.
fn window_end(now: Instant, window: Duration) -> Instant {
    now.checked_add(window)
        .unwrap_or_else(|| now + Duration::from_secs(MAX_WINDOW_SECS))
}

/// Pick the rule for a path: first matching prefix, else the default.
pub fn rule_for_path<'a>(config: &'a RateLimitConfig, path: &str) -> (&'a str, RateLimitRule) {
    config
        .rules
        .iter()
        .find(|r| path.starts_with(r.path_prefix.as_str()))
        .map(|r| (r.name.as_str(), RateLimitRule::new(r.max_requests, r.window_secs)))
        .unwrap_or(("default", RateLimitRule::new(config.max_requests, config.window_secs)))
}

/// Identify the client: forwarded address if trusted, else the peer IP.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
}

/// Middleware enforcing the configured fixed-window limits.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = state.config.load_full();
    if !config.rate_limit.enabled {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer, config.rate_limit.trust_forwarded_for);
    let (rule_name, rule) = rule_for_path(&config.rate_limit, request.uri().path());
    let key = format!("{}:{}", rule_name, client);

    let decision = state.limiter.check(&key, rule);
    if decision.allowed {
        let mut response = next.run(request).await;
        apply_headers(&mut response, &decision);
        response
    } else {
        tracing::warn!(client = %client, rule = rule_name, "Rate limit exceeded");
        metrics::record_rate_limited(rule_name);
        let mut response = ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        }
        .into_response();
        apply_headers(&mut response, &decision);
        response
    }
}
