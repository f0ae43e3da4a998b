//! SQLite access through an r2d2 pool.
//!
//! The binary opens one file-backed pool at startup with
//! [`initialize_database_pool`]; tests and the startup fallback use
//! [`create_in_memory_pool`], which gives every caller its own database.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{error, info, warn};

use super::migrations;

static INITIALIZED: OnceCell<()> = OnceCell::new();

const FILE_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Cloneable handle to the pool
#[derive(Debug, Clone)]
pub struct DatabasePool {
    inner: Arc<r2d2::Pool<SqliteConnectionManager>>,
    in_memory: bool,
}

impl DatabasePool {
    fn wrap(pool: r2d2::Pool<SqliteConnectionManager>, in_memory: bool) -> Self {
        Self { inner: Arc::new(pool), in_memory }
    }

    pub fn conn(&self) -> Result<DbConnection, r2d2::Error> {
        self.inner.get()
    }

    /// True for the `:memory:` fallback, whose data is gone after a restart
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    fn counts(&self) -> (u32, u32) {
        let state = self.inner.state();
        (state.connections, state.idle_connections)
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("sqlite: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("connection pool: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    #[error("the database pool was already opened")]
    PoolAlreadyInitialized,

    #[error("migration failed: {0}")]
    MigrationError(String),

    #[error("database file: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot target {0} already exists")]
    SnapshotExists(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub sqlite_path: String,
    pub max_connections: u32,
    /// Seconds to wait for a free connection
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { sqlite_path: "data/school_health.db".to_string(), max_connections: 10, timeout_seconds: 30 }
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl DatabaseConfig {
    /// Read `DB_SQLITE_PATH`, `DB_MAX_CONNECTIONS` and `DB_TIMEOUT_SECONDS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            sqlite_path: env::var("DB_SQLITE_PATH").unwrap_or(defaults.sqlite_path),
            max_connections: env_number::<u32>("DB_MAX_CONNECTIONS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_connections),
            timeout_seconds: env_number("DB_TIMEOUT_SECONDS").unwrap_or(defaults.timeout_seconds),
        };

        info!(
            path = %config.sqlite_path,
            max_connections = config.max_connections,
            timeout_seconds = config.timeout_seconds,
            "database configuration"
        );
        config
    }
}

/// Open the file-backed pool from the environment and migrate it. Only one call may succeed.
pub fn initialize_database_pool() -> Result<DatabasePool, DatabaseError> {
    if INITIALIZED.get().is_some() {
        return Err(DatabaseError::PoolAlreadyInitialized);
    }

    let pool = open_pool(&DatabaseConfig::from_env())?;
    run_migrations(&pool)?;

    INITIALIZED.set(()).map_err(|_| DatabaseError::PoolAlreadyInitialized)?;
    Ok(pool)
}

/// Open the database file named by `config`, creating its directory.
///
/// An unusable directory or file degrades to an in-memory database rather
/// than failing.
pub fn open_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let path = Path::new(&config.sqlite_path);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create {}: {}; using an in-memory database", dir.display(), e);
            return create_in_memory_pool();
        }
    }

    let manager = SqliteConnectionManager::file(path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        .with_init(|conn| conn.execute_batch(FILE_PRAGMAS));

    match r2d2::Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.timeout_seconds))
        .build(manager)
    {
        Ok(pool) => {
            info!("Opened SQLite database at {}", path.display());
            Ok(DatabasePool::wrap(pool, false))
        }
        Err(e) => {
            error!("Cannot open {}: {}; using an in-memory database", path.display(), e);
            create_in_memory_pool()
        }
    }
}

/// A fresh, migrated in-memory database.
///
/// Each `:memory:` connection is a separate database, hence a single-connection pool.
pub fn create_in_memory_pool() -> Result<DatabasePool, DatabaseError> {
    let manager = SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;

    let pool = DatabasePool::wrap(pool, true);
    run_migrations(&pool)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    let conn = pool.conn()?;
    migrations::run_migrations(&conn).map_err(DatabaseError::MigrationError)
}

/// One-line summary of where the data lives and how busy the pool is
pub fn describe_pool(pool: &DatabasePool) -> String {
    let conn = match pool.conn() {
        Ok(conn) => conn,
        Err(e) => return format!("no SQLite connection available: {}", e),
    };

    let file = conn.query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2)).ok();
    let location = match file.as_deref() {
        Some("") | Some(":memory:") => "SQLite in-memory database".to_string(),
        Some(path) => format!("SQLite database at {}", path),
        None => "SQLite database".to_string(),
    };
    drop(conn);

    let (open, idle) = pool.counts();
    format!("{} ({} open, {} idle)", location, open, idle)
}
