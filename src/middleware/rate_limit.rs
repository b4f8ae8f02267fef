// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-client fixed-window rate limiting.
//!
//! Each client key gets a window `{count, started}`. The first request opens
//! the window, later requests increment it, and once the window duration has
//! elapsed the next request starts a fresh one. Bursts straddling a window
//! boundary can admit up to twice the limit in a short span.
//!
//! The read-modify-write for one key runs under that key's `DashMap` shard
//! lock, so concurrent requests from the same client can never both observe
//! room under the limit. Distinct keys only contend when they share a shard.
//!
//! Memory is bounded: an expired window is indistinguishable from an absent
//! one, so [`RateLimiter::sweep`] drops them. A background task sweeps once per
//! window. A new key arriving at the client cap may trigger an inline sweep,
//! but at most once per `window / INLINE_SWEEPS_PER_WINDOW` so a flood of
//! spoofed keys cannot turn every request into a map-wide scan. Otherwise,
//! or if the map is still full, new clients share the [`OVERFLOW_KEY`] window.

use crate::config::RateLimitConfig;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Key shared by callers with no forwarded-for header and no peer address.
pub const UNKNOWN_CLIENT: &str = "unknown";
/// Key shared by new clients while the window map is at capacity.
pub const OVERFLOW_KEY: &str = "overflow";

const INLINE_SWEEPS_PER_WINDOW: u32 = 10;

/// Request accounting for one client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        remaining: u32,
    },
    /// Rejected; the window resets after `retry_after`.
    Limited {
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// In-process fixed-window limiter.
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    max_requests: u32,
    window: Duration,
    max_clients: usize,
    origin: Instant,
    /// Millis after `origin` of the last inline sweep, plus one; 0 is never.
    last_inline_sweep: AtomicU64,
    inline_sweeps: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, max_clients: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window: config.window,
            max_clients: max_clients.max(1),
            origin: Instant::now(),
            last_inline_sweep: AtomicU64::new(0),
            inline_sweeps: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.max_requests,
            window: self.window,
        }
    }

    /// Number of client windows currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Count one request from `key` now.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // Fast path: known client, no map-wide work.
        if let Some(mut window) = self.windows.get_mut(key) {
            return self.record(&mut window, now);
        }

        let key = self.admit_new_key(key, now);
        let mut window = self.windows.entry(key).or_insert(RateWindow {
            count: 0,
            started: now,
        });
        self.record(&mut window, now)
    }

    /// Drop every window whose duration has fully elapsed. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Error returned to a rejected caller.
    pub fn rejection(&self, retry_after: Duration) -> AppError {
        AppError::RateLimited {
            max_requests: self.max_requests,
            window_secs: self.window.as_secs(),
            retry_after_secs: ceil_secs(retry_after).max(1),
        }
    }

    /// Runs under the key's shard lock.
    fn record(&self, window: &mut RateWindow, now: Instant) -> RateDecision {
        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.window {
            window.count = 0;
            window.started = now;
        }

        window.count = window.count.saturating_add(1);

        if window.count > self.max_requests {
            RateDecision::Limited {
                retry_after: self
                    .window
                    .saturating_sub(now.saturating_duration_since(window.started)),
            }
        } else {
            RateDecision::Allowed {
                remaining: self.max_requests - window.count,
            }
        }
    }

    /// Key to account a first-seen client under.
    fn admit_new_key(&self, key: &str, now: Instant) -> String {
        if self.windows.len() < self.max_clients {
            return key.to_string();
        }

        if !self.claim_inline_sweep(now) {
            return OVERFLOW_KEY.to_string();
        }

        let removed = self.sweep_at(now);
        tracing::debug!(
            removed,
            sweeps = self.inline_sweeps.load(Ordering::Relaxed),
            "Rate limit windows swept at capacity"
        );

        if self.windows.len() < self.max_clients {
            key.to_string()
        } else {
            tracing::warn!(
                capacity = self.max_clients,
                "Rate limiter at capacity, using shared overflow window"
            );
            OVERFLOW_KEY.to_string()
        }
    }

    /// True if the caller won the right to sweep inline at `now`.
    fn claim_inline_sweep(&self, now: Instant) -> bool {
        let interval = millis(self.window / INLINE_SWEEPS_PER_WINDOW);
        let now_ms = millis(now.saturating_duration_since(self.origin)).saturating_add(1);
        let last = self.last_inline_sweep.load(Ordering::Acquire);

        if last != 0 && now_ms.saturating_sub(last) < interval {
            return false;
        }

        let claimed = self
            .last_inline_sweep
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            self.inline_sweeps.fetch_add(1, Ordering::Relaxed);
        }
        claimed
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Client identity: first `X-Forwarded-For` hop, else the peer IP, else [`UNKNOWN_CLIENT`].
pub fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(first_hop) = forwarded {
        return first_hop.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Middleware: count the request and short-circuit with 429 over the limit.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&request);

    match limiter.check(&key) {
        RateDecision::Allowed { .. } => Ok(next.run(request).await),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(
                client = %key,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            Err(limiter.rejection(retry_after))
        }
    }
}

/// Sweep expired windows once per window duration for the life of the process.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!(
                    removed,
                    remaining = limiter.tracked_clients(),
                    "Swept expired rate limit windows"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::sync::atomic::AtomicU32;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                max_requests,
                window: Duration::from_secs(window_secs),
            },
            1000,
        )
    }

    #[test]
    fn test_fixed_window_admits_limit_then_rejects() {
        let limiter = limiter(3, 60);
        let start = Instant::now();

        for i in 0..3 {
            assert!(
                limiter.check_at("1.2.3.4", start + Duration::from_secs(i)).is_allowed(),
                "request {} should pass",
                i + 1
            );
        }

        match limiter.check_at("1.2.3.4", start + Duration::from_secs(10)) {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50));
            }
            other => panic!("4th request should be limited, got {:?}", other),
        }
    }

    #[test]
    fn test_window_resets_after_duration() {
        let limiter = limiter(3, 60);
        let start = Instant::now();

        for _ in 0..4 {
            limiter.check_at("k", start);
        }

        let later = start + Duration::from_secs(61);
        assert_eq!(
            limiter.check_at("k", later),
            RateDecision::Allowed { remaining: 2 }
        );
        let window = *limiter.windows.get("k").unwrap();
        assert_eq!(window.count, 1);
        assert_eq!(window.started, later);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
    }

    #[test]
    fn test_concurrent_same_key_admits_exactly_limit() {
        let limiter = Arc::new(limiter(25, 60));
        let admitted = Arc::new(AtomicU32::new(0));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if limiter.check_at("hot", now).is_allowed() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn test_sweep_removes_only_expired_windows() {
        let limiter = limiter(5, 60);
        let start = Instant::now();

        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(30));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(60)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.windows.contains_key("fresh"));
    }

    #[test]
    fn test_capacity_sweeps_then_overflows() {
        let limiter = RateLimiter::new(
            RateLimitConfig {
                max_requests: 10,
                window: Duration::from_secs(60),
            },
            2,
        );
        let start = Instant::now();

        limiter.check_at("a", start);
        limiter.check_at("b", start);

        // Map full of live windows: newcomers share the overflow window.
        limiter.check_at("c", start + Duration::from_secs(1));
        assert!(limiter.windows.contains_key(OVERFLOW_KEY));
        assert!(!limiter.windows.contains_key("c"));

        // Once the old windows expire the inline sweep makes room again.
        limiter.check_at("d", start + Duration::from_secs(120));
        assert!(limiter.windows.contains_key("d"));
        assert!(!limiter.windows.contains_key("a"));
    }

    #[test]
    fn test_inline_sweeps_are_throttled_at_capacity() {
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig {
                max_requests: 10,
                window: Duration::from_secs(60),
            },
            2,
        ));
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("b", start);

        // A burst of never-seen keys while every window is live.
        let burst = start + Duration::from_secs(1);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        limiter.check_at(&format!("10.{}.{}.{}", t, i / 256, i % 256), burst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(limiter.inline_sweeps.load(Ordering::Relaxed), 1);
        assert_eq!(limiter.tracked_clients(), 3);
        assert!(limiter.windows.contains_key(OVERFLOW_KEY));

        // Still inside the 6s throttle interval.
        limiter.check_at("late", burst + Duration::from_secs(5));
        assert_eq!(limiter.inline_sweeps.load(Ordering::Relaxed), 1);

        limiter.check_at("later", burst + Duration::from_secs(7));
        assert_eq!(limiter.inline_sweeps.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_rejection_reports_limit_and_rounds_retry_up() {
        let limiter = limiter(100, 60);
        match limiter.rejection(Duration::from_millis(1500)) {
            AppError::RateLimited {
                max_requests,
                window_secs,
                retry_after_secs,
            } => {
                assert_eq!(max_requests, 100);
                assert_eq!(window_secs, 60);
                assert_eq!(retry_after_secs, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(
            limiter.rejection(Duration::ZERO).to_string(),
            "Too many requests. Limit: 100 per 60s."
        );
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_key_falls_back_to_peer_then_unknown() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), UNKNOWN_CLIENT);

        let addr: SocketAddr = "198.51.100.2:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&request), "198.51.100.2");
    }

    #[tokio::test]
    async fn test_middleware_short_circuits_with_retry_after() {
        use axum::{routing::get, Router};
        use tower::ServiceExt; // for oneshot

        let limiter = Arc::new(limiter(1, 60));
        let app = Router::new()
            .route("/", get(|| async { "Hello" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter.clone(),
                enforce_rate_limit,
            ));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), axum::http::StatusCode::OK);

        let second = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers().get("retry-after").unwrap(), "60");
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
