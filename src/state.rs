use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::EndpointRateLimiter;

/// The shared application state.
///
/// Cloned into every handler and stateful middleware; all fields are cheap
/// handles to shared data.
#[derive(Clone)]
pub struct AppState {
    /// The Postgres connection pool.
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    /// Token signing and verification keys, derived from `auth.jwt_secret`.
    pub jwt: Arc<JwtKeys>,
    pub metrics: Metrics,
    /// Global and `/api/auth` per-IP limits from `rate_limit`.
    pub rate_limiter: EndpointRateLimiter,
}

impl AppState {
    /// Builds the state. Fails when the token lifetime in `config` cannot be parsed.
    pub fn new(db: PgPool, config: AppConfig) -> anyhow::Result<Self> {
        let jwt = JwtKeys::from_config(&config)?;
        let rate_limiter = EndpointRateLimiter::from_config(&config);
        Ok(Self {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            metrics: Metrics::new(),
            rate_limiter,
        })
    }
}
