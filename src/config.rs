use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

const DEFAULTS: &str = include_str!("../config/default.toml");
const PLACEHOLDER_SECRET: &str = "change-me";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    /// Honour `X-Forwarded-For` / `X-Real-IP` when resolving the client address.
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string. When empty the discrete fields below are used.
    pub url: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Accepts plain seconds ("3600") or a unit suffix ("30m", "1h", "7d").
    pub jwt_expires_in: String,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
    pub auth_max_requests: usize,
    pub auth_window_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
        {
            Ok(app_cfg) => app_cfg,
            Err(e) => {
                eprintln!("FATAL: Failed to load default config: {}", e);
                panic!("Failed to load default config: {}", e);
            }
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    /// Token lifetime parsed from `auth.jwt_expires_in`.
    pub fn token_ttl(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.auth.jwt_expires_in)
    }

    /// Allowed CORS origins, empty entries removed.
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors
            .frontend_url
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl DatabaseConfig {
    /// Builds connect options from `url` or, when it is empty, from the discrete fields.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode)
            .map_err(|e| anyhow::anyhow!("invalid database.ssl_mode '{}': {}", self.ssl_mode, e))?;
        if !self.url.trim().is_empty() {
            let opts = PgConnectOptions::from_str(self.url.trim())
                .map_err(|e| anyhow::anyhow!("invalid database.url: {}", e))?;
            // An explicit sslmode inside the URL wins over the configured default
            if self.url.contains("sslmode=") {
                return Ok(opts);
            }
            return Ok(opts.ssl_mode(ssl_mode));
        }
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name)
            .ssl_mode(ssl_mode);
        if !self.password.is_empty() {
            opts = opts.password(&self.password);
        }
        Ok(opts)
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();
    let vars: ::config::Map<String, String> = std::env::vars().collect();
    load_from_vars(&vars)
}

/// The layering behind [`load`], with `vars` standing in for the process environment.
pub fn load_from_vars(vars: &::config::Map<String, String>) -> anyhow::Result<AppConfig> {
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: bookshelf.toml (in CWD)
        .add_source(::config::File::with_name("bookshelf").required(false));

    if let Some(custom_path) = vars.get("BOOKSHELF_CONFIG") {
        builder = builder.add_source(::config::File::with_name(custom_path).required(false));
    }
    builder = builder.add_source(
        ::config::Environment::with_prefix("BOOKSHELF")
            .separator("__")
            .source(Some(vars.clone())),
    );
    // Conventional flat variables last to have highest precedence
    builder = apply_flat_env(builder, |key| vars.get(key).cloned())?;

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Parses a TOML fragment layered over the embedded defaults. Used for tests and tooling.
pub fn from_toml_str(overrides: &str) -> anyhow::Result<AppConfig> {
    from_toml_layers(&[overrides])
}

/// Like [`from_toml_str`] with several fragments; later ones win.
pub fn from_toml_layers(layers: &[&str]) -> anyhow::Result<AppConfig> {
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml));
    for layer in layers {
        builder = builder.add_source(::config::File::from_str(layer, ::config::FileFormat::Toml));
    }
    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

const FLAT_ENV_KEYS: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("JWT_SECRET", "auth.jwt_secret"),
    ("JWT_EXPIRES_IN", "auth.jwt_expires_in"),
    ("FRONTEND_URL", "cors.frontend_url"),
    ("PORT", "server.port"),
    ("NODE_ENV", "environment"),
];

/// Maps the conventional unprefixed variables (`DATABASE_URL`, `JWT_SECRET`, ...) onto config keys.
pub fn apply_flat_env<St, F>(
    mut builder: ::config::ConfigBuilder<St>,
    lookup: F,
) -> anyhow::Result<::config::ConfigBuilder<St>>
where
    St: ::config::builder::BuilderState,
    F: Fn(&str) -> Option<String>,
{
    for (var, key) in FLAT_ENV_KEYS {
        let value = lookup(var).filter(|v| !v.trim().is_empty());
        builder = builder.set_override_option(*key, value)?;
    }
    Ok(builder)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.body_limit_bytes < 1024 {
        return Err(anyhow::anyhow!("server.body_limit_bytes must be >= 1024"));
    }

    // Database
    if cfg.database.max_connections == 0 || cfg.database.max_connections > 100 {
        return Err(anyhow::anyhow!("database.max_connections must be in 1..=100"));
    }
    if cfg.database.connect_timeout_secs == 0 {
        return Err(anyhow::anyhow!("database.connect_timeout_secs must be > 0"));
    }

    // Auth
    if cfg.auth.jwt_secret.trim().is_empty() {
        return Err(anyhow::anyhow!("auth.jwt_secret must not be empty"));
    }
    if cfg.is_production() && cfg.auth.jwt_secret == PLACEHOLDER_SECRET {
        return Err(anyhow::anyhow!("auth.jwt_secret must be set in production (JWT_SECRET)"));
    }
    if cfg.auth.jwt_secret == PLACEHOLDER_SECRET {
        tracing::warn!("Using the placeholder JWT secret; set JWT_SECRET outside development");
    }
    let ttl = cfg.token_ttl()?;
    if ttl.is_zero() {
        return Err(anyhow::anyhow!("auth.jwt_expires_in must be > 0"));
    }
    if !(4..=31).contains(&cfg.auth.bcrypt_cost) {
        return Err(anyhow::anyhow!("auth.bcrypt_cost must be in 4..=31"));
    }

    // Rate limiting
    if cfg.rate_limit.max_requests == 0 || cfg.rate_limit.auth_max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit max request counts must be > 0"));
    }
    if cfg.rate_limit.window_seconds == 0 || cfg.rate_limit.auth_window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit windows must be > 0"));
    }

    Ok(())
}

/// Parses durations in the `jsonwebtoken`-style shorthand: `"90"`, `"45s"`, `"30m"`, `"12h"`, `"7d"`, `"2w"`.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let s = raw.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration '{}': expected a number with optional unit", raw))?;
    let secs = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "seconds" => Some(value),
        "m" | "min" | "mins" | "minutes" => value.checked_mul(60),
        "h" | "hr" | "hrs" | "hours" => value.checked_mul(3_600),
        "d" | "day" | "days" => value.checked_mul(86_400),
        "w" | "week" | "weeks" => value.checked_mul(604_800),
        other => return Err(anyhow::anyhow!("invalid duration unit '{}' in '{}'", other, raw)),
    };
    secs.map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("duration '{}' is too large", raw))
}
