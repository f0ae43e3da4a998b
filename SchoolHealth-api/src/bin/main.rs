use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use school_health_api::api::handlers::health::initialize_server_start_time;
use school_health_api::api::uploads::upload_dir_from_env;
use school_health_api::{create_application, AppState};
use school_health_domain::auth::token_blacklist;
use school_health_domain::database::{create_in_memory_pool, initialize_database_pool};
use school_health_domain::services::{
    create_default_services, start_backup_scheduler, start_unlock_sweeper, sweep_interval_from_env, AdminCredentials,
    BackupConfig,
};

/// The main entry point for the SchoolHealth API server
///
/// This function:
/// 1. Loads `.env` and sets up tracing
/// 2. Opens the SQLite pool, falling back to memory
/// 3. Wires the services and starts the background tasks
/// 4. Serves the Axum application until a shutdown signal
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_ansi(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stdout),
        )
        .with(env_filter)
        .init();

    info!("Starting SchoolHealth API server");

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    if std::env::var("DB_SQLITE_PATH").is_err() {
        let db_path = PathBuf::from(&data_dir).join("school_health.db");
        std::env::set_var("DB_SQLITE_PATH", db_path.to_string_lossy().to_string());
        info!("Set DB_SQLITE_PATH to {}", db_path.display());
    }

    let pool = match initialize_database_pool() {
        Ok(pool) => {
            info!("Database pool initialized successfully");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database pool: {}", e);
            warn!("Falling back to an in-memory database; data will not survive a restart");
            create_in_memory_pool().context("in-memory database could not be created")?
        }
    };

    let admin = AdminCredentials::from_env();
    let backup_config = BackupConfig::from_env();
    let schedule_backups = backup_config.schedule_enabled;
    let services = create_default_services(pool.clone(), admin, backup_config);

    token_blacklist::start_cleanup_task();
    start_unlock_sweeper(services.exam_sessions.clone(), sweep_interval_from_env());
    if schedule_backups {
        start_backup_scheduler(services.backups.clone());
    } else {
        info!("Scheduled backups are disabled");
    }

    initialize_server_start_time();

    let upload_dir = upload_dir_from_env();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .with_context(|| format!("upload directory {} could not be created", upload_dir.display()))?;

    let app = create_application(AppState::new(services, pool, upload_dir));

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("PORT must be a number")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for CTRL+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
