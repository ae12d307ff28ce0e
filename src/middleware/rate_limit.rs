//! In-memory sliding-window rate limiter for anonymous and login endpoints.
//! State lives per process; a multi-instance deployment needs a shared store.
use crate::error::AppError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
    trust_proxy: bool,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
            trust_proxy: false,
        }
    }

    /// Keys requests on the hop appended by a trusted reverse proxy.
    pub fn trusting_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub fn client_key(&self, headers: &HeaderMap, addr: &SocketAddr) -> String {
        client_ip(headers, addr, self.trust_proxy)
    }

    /// Records a request for `identifier` and reports whether it is allowed.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let history = requests.entry(identifier.to_string()).or_default();
        history.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }

    /// Drops identifiers with no requests inside the window.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, history| {
            history.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !history.is_empty()
        });

        tracing::debug!("Rate limiter cleanup: {} active identifiers", requests.len());
    }
}

/// Peer address, or the last `X-Forwarded-For` hop when a proxy we run appends it.
/// Earlier hops are client-controlled and never used.
pub fn client_ip(headers: &HeaderMap, addr: &SocketAddr, trust_proxy: bool) -> String {
    if !trust_proxy {
        return addr.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = limiter.client_key(request.headers(), &addr);

    if !limiter.check(&ip).await {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        return AppError::RateLimited.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("test_ip").await);
        assert!(limiter.check("test_ip").await);
        assert!(limiter.check("test_ip").await);

        // 4th request should be blocked
        assert!(!limiter.check("test_ip").await);

        assert!(limiter.check("other_ip").await);
    }

    #[tokio::test]
    async fn test_cleanup() {
        let limiter = RateLimiter::new(5, 1);

        limiter.check("ip1").await;
        limiter.check("ip2").await;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.cleanup().await;

        let requests = limiter.requests.read().await;
        assert_eq!(requests.len(), 0);
    }

    #[test]
    fn test_client_ip_uses_last_hop_only_behind_trusted_proxy() {
        let addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, &addr, true), "10.0.0.1");

        headers.insert("x-forwarded-for", "203.0.113.7, 198.51.100.4".parse().unwrap());
        assert_eq!(client_ip(&headers, &addr, false), "10.0.0.1");
        assert_eq!(client_ip(&headers, &addr, true), "198.51.100.4");
    }

    #[tokio::test]
    async fn test_forged_forwarded_for_does_not_reset_the_count() {
        let limiter = RateLimiter::new(1, 60);
        let addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        let mut allowed = 0;
        for i in 0..50 {
            let mut headers = HeaderMap::new();
            headers.insert("x-forwarded-for", format!("203.0.113.{i}").parse().unwrap());
            if limiter.check(&limiter.client_key(&headers, &addr)).await {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
    }

    #[tokio::test]
    async fn test_trusted_proxy_keys_on_appended_hop() {
        let limiter = RateLimiter::new(1, 60).trusting_proxy(true);
        let proxy: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        let mut allowed = 0;
        for i in 0..10 {
            let mut headers = HeaderMap::new();
            let forged = format!("203.0.113.{i}, 198.51.100.4");
            headers.insert("x-forwarded-for", forged.parse().unwrap());
            if limiter.check(&limiter.client_key(&headers, &proxy)).await {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
    }
}
