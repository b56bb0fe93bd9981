//! Per-IP request limiting for `/api`.
//!
//! Sliding window: each client IP may make `max_requests` requests in any
//! `window`. Rejected requests get the standard error envelope with
//! `RATE_LIMIT_EXCEEDED` and a `Retry-After` header.
//!
//! The client IP is taken from `X-Forwarded-For` (first entry), then
//! `X-Real-IP`, then the peer address. When none is available the request is
//! let through.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cvbuilder_core::AppError;
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::state::AppState;

const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

#[derive(Debug, Default)]
struct Hits {
    timestamps: Vec<Instant>,
}

impl Hits {
    fn prune(&mut self, now: Instant, window: Duration) {
        self.timestamps.retain(|&t| now.duration_since(t) < window);
    }

    /// How long until the oldest hit leaves the window.
    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        self.timestamps
            .first()
            .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or_default()
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<IpAddr, Hits>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Record a request from `ip` if it is still within its allowance.
    pub fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut entries = self.entries.lock();
        let hits = entries.entry(ip).or_default();
        hits.prune(now, self.config.window);
        if hits.timestamps.len() >= self.config.max_requests {
            return Decision::Limited {
                retry_after: hits.retry_after(now, self.config.window),
            };
        }
        hits.timestamps.push(now);
        Decision::Allowed {
            remaining: self.config.max_requests - hits.timestamps.len(),
        }
    }

    /// Drop IPs with no hits left in the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.entries.lock().retain(|_, hits| {
            hits.prune(now, window);
            !hits.timestamps.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.lock().len()
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
}

pub fn client_ip(request: &Request) -> Option<IpAddr> {
    header_ip(request.headers(), "x-forwarded-for")
        .or_else(|| header_ip(request.headers(), "x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(ip) = client_ip(&request) else {
        tracing::warn!("Cannot determine client IP for rate limiting, allowing request");
        return next.run(request).await;
    };
    let limit = state.rate_limiter.config().max_requests;

    match state.rate_limiter.check(ip) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            set_header(response.headers_mut(), "x-ratelimit-limit", limit);
            set_header(response.headers_mut(), "x-ratelimit-remaining", remaining);
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(%ip, path = %request.uri().path(), "Rate limit exceeded");
            let mut response = ApiError(AppError::RateLimit(RATE_LIMIT_MESSAGE.into())).into_response();
            let headers = response.headers_mut();
            set_header(headers, "x-ratelimit-limit", limit);
            set_header(headers, "x-ratelimit-remaining", 0);
            // Round up so clients never retry a moment too early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                headers.insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

/// Periodically forget idle clients.
pub fn spawn_cleanup(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    let period = limiter.config().window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            limiter.cleanup();
            tracing::debug!(clients = limiter.tracked_clients(), "Rate limiter cleanup");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(secs),
        })
    }

    #[test]
    fn test_allows_up_to_max_then_limits() {
        let limiter = limiter(3, 60);
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        let now = Instant::now();

        assert_eq!(limiter.check_at(ip, now), Decision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at(ip, now), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at(ip, now), Decision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check_at(ip, now), Decision::Limited { .. }));
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(1, 60);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(matches!(limiter.check_at(ip, start), Decision::Allowed { .. }));
        match limiter.check_at(ip, start + Duration::from_secs(20)) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(40)),
            other => panic!("expected limit, got {other:?}"),
        }
        assert!(matches!(
            limiter.check_at(ip, start + Duration::from_secs(61)),
            Decision::Allowed { .. }
        ));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1, 60);
        let a: IpAddr = "192.168.1.1".parse().unwrap();
        let b: IpAddr = "192.168.1.2".parse().unwrap();
        assert!(matches!(limiter.check(a), Decision::Allowed { .. }));
        assert!(matches!(limiter.check(a), Decision::Limited { .. }));
        assert!(matches!(limiter.check(b), Decision::Allowed { .. }));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_client_ip_precedence() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), "203.0.113.7".parse().ok());

        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "garbage")
            .header("x-real-ip", "198.51.100.2")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), "198.51.100.2".parse().ok());

        let mut request = axum::http::Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_ip(&request), None);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_ip(&request), "127.0.0.1".parse().ok());
    }
}
