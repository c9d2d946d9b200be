use std::net::SocketAddr;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::time;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookshelf::{app, config, db, error, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging: stdout plus daily rotated files under ./logs
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "bookshelf.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Dropping the guards would lose buffered log lines
    let _log_guards = (stdout_guard, file_guard);

    // Embedded defaults -> bookshelf.toml -> BOOKSHELF_CONFIG -> env/.env
    let app_cfg = config::load()?;
    error::configure(app_cfg.is_production());
    info!("Starting in {} mode", app_cfg.environment);

    let db_cfg = &app_cfg.database;
    let pool = PgPoolOptions::new()
        .max_connections(db_cfg.max_connections)
        .acquire_timeout(Duration::from_secs(db_cfg.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(db_cfg.idle_timeout_secs))
        .connect_with(db_cfg.connect_options()?)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Postgres: {}", e))?;

    db::init_db(&pool).await?;

    let state = AppState::new(pool, app_cfg.clone())?;

    // Forget idle clients so the limiter maps do not grow without bound
    {
        let rl = state.rate_limiter.clone();
        let every = Duration::from_secs(app_cfg.rate_limit.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            loop {
                ticker.tick().await;
                rl.cleanup_all().await;
            }
        });
    }

    let app = app::build_router(state);

    let host = &app_cfg.server.host;
    let port = app_cfg.server.port;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Bookshelf API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
