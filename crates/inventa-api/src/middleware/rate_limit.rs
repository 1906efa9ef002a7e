//! # Per-Caller Rate Limiting
//!
//! Fixed-window request budget keyed by the acting user. Requests without
//! a user id share the `anonymous` bucket. Rejections carry `Retry-After`
//! with the seconds left in the caller's window.
//!
//! Callers choose their own user id, so windows that have run out are
//! swept at most once per window length. Memory is bounded by the number
//! of distinct callers seen within two consecutive windows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;

use crate::auth::CallerIdentity;
use crate::error::AppError;

const ANONYMOUS: &str = "anonymous";

/// Budget per caller: `max_requests` in every `window_secs` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u64,
}

#[derive(Debug)]
struct Windows {
    by_caller: HashMap<String, Window>,
    last_sweep: Instant,
}

impl Windows {
    /// Drop every window older than `len`, at most once per `len`.
    fn sweep(&mut self, now: Instant, len: Duration) {
        if now.saturating_duration_since(self.last_sweep) < len {
            return;
        }
        self.by_caller
            .retain(|_, w| now.saturating_duration_since(w.opened) < len);
        self.last_sweep = now;
    }
}

/// Shared limiter, installed as a request extension.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<Windows>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(Windows {
                by_caller: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Number of callers currently holding a window.
    pub fn tracked_callers(&self) -> usize {
        self.windows.lock().by_caller.len()
    }

    fn window_len(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    /// Spend one request of `caller`'s budget at `now`.
    ///
    /// On refusal returns the whole seconds until the window reopens
    /// (at least 1).
    fn acquire_at(&self, caller: &str, now: Instant) -> Result<(), u64> {
        let len = self.window_len();
        let mut windows = self.windows.lock();
        windows.sweep(now, len);
        let window = windows
            .by_caller
            .entry(caller.to_owned())
            .or_insert(Window { opened: now, used: 0 });

        if now.saturating_duration_since(window.opened) >= len {
            *window = Window { opened: now, used: 0 };
        }
        if window.used < self.config.max_requests {
            window.used += 1;
            return Ok(());
        }

        let left = len.saturating_sub(now.saturating_duration_since(window.opened));
        Err(left.as_secs().max(1))
    }

    /// Spend one request of `caller`'s budget now.
    pub fn acquire(&self, caller: &str) -> Result<(), u64> {
        self.acquire_at(caller, Instant::now())
    }
}

fn caller_key(request: &Request) -> String {
    request
        .extensions()
        .get::<CallerIdentity>()
        .and_then(|caller| caller.user_id)
        .map_or_else(|| ANONYMOUS.to_owned(), |id| id.to_string())
}

/// Middleware enforcing the per-caller budget. Runs after authentication so
/// the caller identity is available.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let Some(limiter) = request.extensions().get::<RateLimiter>().cloned() else {
        return next.run(request).await;
    };

    let key = caller_key(&request);
    if let Err(retry_after_secs) = limiter.acquire(&key) {
        tracing::warn!(caller = %key, retry_after_secs, "request budget spent");
        return AppError::RateLimited { retry_after_secs }.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u64, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window_secs,
        })
    }

    #[test]
    fn budget_is_per_caller() {
        let limiter = limiter(2, 60);
        let t0 = Instant::now();
        assert!(limiter.acquire_at("a", t0).is_ok());
        assert!(limiter.acquire_at("a", t0).is_ok());
        assert_eq!(limiter.acquire_at("a", t0), Err(60));
        assert!(limiter.acquire_at("b", t0).is_ok());
    }

    #[test]
    fn retry_after_counts_down_and_window_reopens() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        assert!(limiter.acquire_at("a", t0).is_ok());
        assert_eq!(limiter.acquire_at("a", t0 + Duration::from_secs(45)), Err(15));
        assert_eq!(
            limiter.acquire_at("a", t0 + Duration::from_millis(59_900)),
            Err(1)
        );
        assert!(limiter.acquire_at("a", t0 + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn expired_windows_are_swept() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        for _ in 0..500 {
            assert!(limiter.acquire_at(&uuid::Uuid::new_v4().to_string(), t0).is_ok());
        }
        assert_eq!(limiter.tracked_callers(), 500);

        let later = t0 + Duration::from_secs(61);
        assert!(limiter.acquire_at("fresh", later).is_ok());
        assert_eq!(limiter.tracked_callers(), 1);
    }

    #[test]
    fn sweep_keeps_windows_still_running() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        assert!(limiter.acquire_at("old", t0).is_ok());
        assert!(limiter.acquire_at("recent", t0 + Duration::from_secs(50)).is_ok());

        let later = t0 + Duration::from_secs(70);
        assert!(limiter.acquire_at("other", later).is_ok());
        assert_eq!(limiter.tracked_callers(), 2);
        assert!(limiter.acquire_at("recent", later).is_err());
    }

    #[test]
    fn zero_length_window_never_refuses() {
        let limiter = limiter(1, 0);
        let t0 = Instant::now();
        assert!(limiter.acquire_at("a", t0).is_ok());
        assert!(limiter.acquire_at("a", t0).is_ok());
    }
}
