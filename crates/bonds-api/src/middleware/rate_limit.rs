//! Per-IP rate limiting with a token bucket per client.
//!
//! Each address may spend `max_requests` per `window`; tokens replenish
//! continuously. Only paths under the configured scope are counted.

use super::metrics::ApiMetrics;
use crate::domain::config::RateLimitConfig;
use crate::http::ApiError;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

struct TokenBucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    /// For idle bucket cleanup
    last_access: Instant,
}

fn quota(config: &RateLimitConfig) -> Quota {
    let burst = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
    let period = config.window / burst.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl TokenBucket {
    fn new(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
            last_access: Instant::now(),
        }
    }

    fn check(&mut self) -> Result<(), Duration> {
        self.last_access = Instant::now();
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

/// Buckets shared by every clone of the layer
pub struct RateLimitState {
    buckets: DashMap<IpAddr, TokenBucket>,
    quota: Quota,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            quota: quota(&config),
            config,
        }
    }

    /// `Err` carries how long the client should wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if !self.config.enabled || self.config.whitelist.contains(&ip) {
            return Ok(());
        }

        let mut bucket = self.buckets.entry(ip).or_insert_with(|| {
            debug!(ip = %ip, "Creating new rate limit bucket");
            TokenBucket::new(self.quota)
        });
        bucket.check()
    }

    /// Drop buckets idle for longer than `max_age`. Returns how many went.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_access) <= max_age);
        before.saturating_sub(self.buckets.len())
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    metrics: Arc<ApiMetrics>,
    scope: Arc<str>,
}

impl RateLimitLayer {
    /// Limit requests whose path starts with `scope`.
    pub fn new(config: RateLimitConfig, metrics: Arc<ApiMetrics>, scope: &str) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            metrics,
            scope: Arc::from(scope),
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            scope: Arc::clone(&self.scope),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    metrics: Arc<ApiMetrics>,
    scope: Arc<str>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let in_scope = req.uri().path().starts_with(&*self.scope);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !in_scope {
                return inner.call(req).await;
            }

            let ip = extract_client_ip(&req);
            match state.check(ip) {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    let retry_secs = retry_after.as_millis().div_ceil(1000).max(1) as u64;
                    warn!(ip = %ip, retry_after_secs = retry_secs, "Rate limit exceeded");
                    metrics.record_rate_limit_rejection();
                    Ok(ApiError::rate_limited(retry_secs).into_response())
                }
            }
        })
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
fn extract_client_ip<B>(req: &Request<B>) -> IpAddr {
    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            max_requests: 5,
            window: Duration::from_secs(60),
            whitelist: vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))],
        }
    }

    #[test]
    fn test_rate_limit_blocks_over_limit() {
        let state = RateLimitState::new(test_config());
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        for _ in 0..5 {
            assert!(state.check(ip).is_ok());
        }
        let wait = state.check(ip).unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(12));
    }

    #[test]
    fn test_buckets_are_per_ip() {
        let state = RateLimitState::new(test_config());
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4));
        for _ in 0..5 {
            let _ = state.check(a);
        }
        assert!(state.check(a).is_err());
        assert!(state.check(b).is_ok());
    }

    #[test]
    fn test_whitelist_bypasses_limit() {
        let state = RateLimitState::new(test_config());
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        for _ in 0..50 {
            assert!(state.check(ip).is_ok());
        }
        assert_eq!(state.bucket_count(), 0);
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let state = RateLimitState::new(config);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        for _ in 0..50 {
            assert!(state.check(ip).is_ok());
        }
    }

    #[test]
    fn test_cleanup_removes_stale_buckets() {
        let state = RateLimitState::new(test_config());
        let _ = state.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6)));
        assert_eq!(state.bucket_count(), 1);
        assert_eq!(state.cleanup(Duration::from_secs(3600)), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(state.cleanup(Duration::ZERO), 1);
        assert_eq!(state.bucket_count(), 0);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req), "203.0.113.7".parse::<IpAddr>().unwrap());

        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req), "198.51.100.2".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_layer_rejects_with_retry_after_inside_scope_only() {
        let mut config = test_config();
        config.max_requests = 1;
        let metrics = Arc::new(ApiMetrics::new());
        let layer = RateLimitLayer::new(config, Arc::clone(&metrics), "/api");
        let service = layer.layer(tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        }));
        let request = |path: &str| {
            Request::builder()
                .uri(path)
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .unwrap()
        };

        let first = service.clone().oneshot(request("/api/bonds")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = service.clone().oneshot(request("/api/bonds")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
        let health = service.clone().oneshot(request("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(metrics.snapshot().rate_limited, 1);
    }
}
