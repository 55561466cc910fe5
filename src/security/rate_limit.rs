//! Per-caller rate limiting for everything under the configured path prefix.
//!
//! Each caller gets a fixed window that opens on its first counted request
//! and expires `window` later; the next request after expiry opens a fresh
//! window. Windows are independent per caller.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::http::context::caller_identity;
use crate::observability::metrics;
use crate::state::AppState;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Outcome of counting one request against a caller's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    Denied {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Counter store consulted by the rate-limiting stage.
///
/// Implementations must make `check_and_increment` atomic per key.
pub trait RateLimiter: Send + Sync + fmt::Debug {
    fn check_and_increment(&self, key: &str) -> RateDecision;

    /// Drop state for callers whose window has expired. Returns how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// In-memory fixed-window limiter keyed by caller identity.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    max: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max, config.window())
    }

    /// Count one request for `key` as if it arrived at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // The entry guard holds the shard lock until the decision is made.
        let mut entry = self.windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            hits: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }

        entry.hits = entry.hits.saturating_add(1);
        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(entry.started));

        if entry.hits > self.max {
            RateDecision::Denied {
                limit: self.max,
                retry_after: reset_after,
            }
        } else {
            RateDecision::Allowed {
                limit: self.max,
                remaining: self.max - entry.hits,
                reset_after,
            }
        }
    }

    /// Remove windows that expired before `now`.
    pub fn purge_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of callers currently tracked.
    pub fn tracked_callers(&self) -> usize {
        self.windows.len()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check_and_increment(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn purge_expired(&self) -> usize {
        self.purge_at(Instant::now())
    }
}

/// Limiter stage. Requests outside the configured prefix pass untouched.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = &state.config.rate_limit;
    if !config.enabled || !config.covers(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let caller = caller_identity(&request, config.trust_forwarded_for);

    match state.limiter.check_and_increment(caller.as_str()) {
        RateDecision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
            headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset_after)));
            Ok(response)
        }
        RateDecision::Denied { limit, retry_after } => {
            tracing::warn!(client = %caller, limit, "Rate limit exceeded");
            metrics::record_rate_limited();
            Err(ApiError::RateLimited { retry_after })
        }
    }
}

/// Periodically purge expired windows until the returned handle is aborted.
pub fn spawn_purge_task(limiter: Arc<dyn RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Purged expired rate-limit windows");
            }
        }
    })
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        for expected_remaining in [2, 1, 0] {
            match limiter.check_at("1.2.3.4", now) {
                RateDecision::Allowed { remaining, .. } => assert_eq!(remaining, expected_remaining),
                other => panic!("expected allowed, got {:?}", other),
            }
        }
        assert!(!limiter.check_at("1.2.3.4", now).is_allowed());
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let window = Duration::from_secs(60);
        let limiter = FixedWindowLimiter::new(1, window);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).is_allowed());
        assert!(!limiter.check_at("a", start + Duration::from_secs(59)).is_allowed());
        assert!(limiter.check_at("a", start + window).is_allowed());
    }

    #[test]
    fn test_callers_are_isolated() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
    }

    #[test]
    fn test_retry_after_counts_down() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("a", start);

        match limiter.check_at("a", start + Duration::from_secs(45)) {
            RateDecision::Denied { retry_after, limit } => {
                assert_eq!(limit, 1);
                assert_eq!(retry_after, Duration::from_secs(15));
            }
            other => panic!("expected denied, got {:?}", other),
        }
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let window = Duration::from_secs(10);
        let limiter = FixedWindowLimiter::new(5, window);
        let start = Instant::now();

        limiter.check_at("old", start);
        limiter.check_at("new", start + Duration::from_secs(8));

        assert_eq!(limiter.purge_at(start + Duration::from_secs(12)), 1);
        assert_eq!(limiter.tracked_callers(), 1);
    }

    #[test]
    fn test_concurrent_callers_keep_exact_counts() {
        let limiter = Arc::new(FixedWindowLimiter::new(1000, Duration::from_secs(60)));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    let key = format!("caller-{}", i % 2);
                    for _ in 0..100 {
                        limiter.check_at(&key, now);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 4 threads x 100 hits per key
        for key in ["caller-0", "caller-1"] {
            match limiter.check_at(key, now) {
                RateDecision::Allowed { remaining, .. } => assert_eq!(remaining, 1000 - 401),
                other => panic!("expected allowed, got {:?}", other),
            }
        }
    }
}
