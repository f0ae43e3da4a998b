pub mod error;
pub mod handlers;
pub mod routes;
pub mod uploads;

use std::path::PathBuf;

use axum::Router;

use school_health_data::database::DatabasePool;
use school_health_domain::services::Services;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub pool: DatabasePool,
    /// Where uploaded images and files are written
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(services: Services, pool: DatabasePool, upload_dir: PathBuf) -> Self {
        Self { services, pool, upload_dir }
    }
}

/// Create the application router
pub fn create_application(state: AppState) -> Router {
    routes::create_app(state)
}
