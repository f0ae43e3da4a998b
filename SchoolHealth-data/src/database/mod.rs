// Database modules
pub mod connection;
pub mod maintenance;
pub mod migrations;

// Re-export database connection functions
pub use connection::*;
pub use migrations::APPLICATION_TABLES;
