use super::ip::request_ip;
use super::validation::sanitize_for_logging;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Probes that orchestrators poll; never throttled.
const EXEMPT_PATHS: &[&str] = &["/healthz", "/readyz"];

/// A thread-safe rate limiter based on the sliding window algorithm.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Records a request from `ip`, or rejects it with the seconds until a slot frees up.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<(), AppError> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let timestamps = requests.entry(ip).or_default();

        // On clock skew keep the timestamp
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let wait = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            // Round up so clients never retry a fraction of a second too early
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(AppError::RateLimited { retry_after_seconds: secs.max(1) });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops expired timestamps and forgets clients with none left.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }

    pub async fn tracked_clients(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// A global per-IP limiter plus stricter limiters for path prefixes.
///
/// A request under `/api/auth/login` counts against the global bucket and the
/// `/api/auth` bucket; it is rejected when either is full.
#[derive(Clone)]
pub struct EndpointRateLimiter {
    global: RateLimiter,
    prefixes: Arc<Vec<(String, RateLimiter)>>,
    trust_proxy: bool,
}

impl EndpointRateLimiter {
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            global: RateLimiter::new(max_requests, window_seconds),
            prefixes: Arc::new(Vec::new()),
            trust_proxy: false,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let rl = &cfg.rate_limit;
        Self::new(rl.max_requests, rl.window_seconds)
            .with_limits(vec![("/api/auth", rl.auth_max_requests, rl.auth_window_seconds)])
            .trust_proxy(cfg.server.trust_proxy)
    }

    /// Adds prefix limits. A prefix that is already present gets its limit replaced.
    pub fn with_limits(self, limits: Vec<(&str, usize, u64)>) -> Self {
        let mut prefixes: Vec<(String, RateLimiter)> = self.prefixes.as_ref().clone();
        for (prefix, max_requests, window_seconds) in limits {
            let limiter = RateLimiter::new(max_requests, window_seconds);
            match prefixes.iter_mut().find(|(p, _)| p == prefix) {
                Some(entry) => entry.1 = limiter,
                None => prefixes.push((prefix.to_string(), limiter)),
            }
        }
        Self { prefixes: Arc::new(prefixes), ..self }
    }

    pub fn trust_proxy(self, trust_proxy: bool) -> Self {
        Self { trust_proxy, ..self }
    }

    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
    }

    pub async fn check(&self, path: &str, ip: IpAddr) -> Result<(), AppError> {
        self.global.check_rate_limit(ip).await?;
        for (prefix, limiter) in self.prefixes.iter() {
            if path_has_prefix(path, prefix) {
                limiter.check_rate_limit(ip).await?;
            }
        }
        Ok(())
    }

    pub async fn cleanup_all(&self) {
        self.global.cleanup_old_entries().await;
        for (_, limiter) in self.prefixes.iter() {
            limiter.cleanup_old_entries().await;
        }
    }
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Rejects the request with 429 when the client's buckets are full.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();
    if EXEMPT_PATHS.contains(&path) {
        return Ok(next.run(req).await);
    }
    let limiter = &state.rate_limiter;
    let ip = request_ip(&req, limiter.trusts_proxy());
    if let Err(e) = limiter.check(path, ip).await {
        state.metrics.inc_rate_limited();
        tracing::warn!("Rate limit exceeded for {} on {}", ip, sanitize_for_logging(path));
        return Err(e);
    }
    Ok(next.run(req).await)
}
