// SchoolHealth Data
// This crate owns the SQLite database: connection pool, migrations and repositories

// Database connection management, migrations and snapshots
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;
