// SchoolHealth Domain
// This crate contains the business logic for the SchoolHealth application

// Domain entities
pub mod entities;

// Services that implement business logic
pub mod services;

// Authentication
pub mod auth;

// Error type shared by the services
pub mod errors;

// Health checks and system status
pub mod health;

// CSV / Excel reading and CSV writing for imports and exports
pub mod tabular;

// Re-export the database module from school_health_data for convenience
pub use school_health_data::database;
