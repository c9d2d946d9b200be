use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::AppConfig;

/// CORS for the browser frontend.
///
/// With `cors.frontend_url` set, only those origins are allowed. Without it,
/// development servers allow any origin and production allows none.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins()
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", o, e);
                None
            }
        })
        .collect();

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if !origins.is_empty() {
        base.allow_origin(AllowOrigin::list(origins))
    } else if cfg.is_production() {
        tracing::warn!("No CORS origins configured; cross-origin browser requests will be refused");
        base
    } else {
        base.allow_origin(AllowOrigin::any())
    }
}
