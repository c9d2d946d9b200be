//! Security headers for every response.
//!
//! The API serves JSON only, so the defaults are strict: no framing, no
//! sniffing, no referrer, and a CSP that forbids loading anything.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::AppConfig;

const DEFAULT_HSTS_MAX_AGE: u64 = 15_552_000; // 180 days

/// Adds helmet-style security headers and a no-store policy for JSON bodies.
///
/// HSTS is only sent when `security.enable_hsts` is set, since it must not
/// be announced by deployments that are reachable over plain HTTP.
pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    let fixed: [(&'static str, &'static str); 8] = [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "no-referrer"),
        ("x-dns-prefetch-control", "off"),
        ("x-permitted-cross-domain-policies", "none"),
        ("cross-origin-opener-policy", "same-origin"),
        ("cross-origin-resource-policy", "same-site"),
        ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    ];
    for (name, value) in fixed {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    let sec = cfg.security.clone().unwrap_or_default();
    if sec.enable_hsts.unwrap_or(false) {
        let max_age = sec.hsts_max_age.unwrap_or(DEFAULT_HSTS_MAX_AGE);
        let include_sub = if sec.hsts_include_subdomains.unwrap_or(true) { "; includeSubDomains" } else { "" };
        if let Ok(v) = HeaderValue::from_str(&format!("max-age={}{}", max_age, include_sub)) {
            headers.insert(HeaderName::from_static("strict-transport-security"), v);
        }
    }
    if let Some(csp) = sec.csp.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        match HeaderValue::from_str(csp) {
            Ok(v) => {
                headers.insert(HeaderName::from_static("content-security-policy"), v);
            }
            Err(e) => tracing::warn!("Ignoring invalid security.csp value: {}", e),
        }
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|s| s.starts_with("application/json"));
    if is_json {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    res
}
