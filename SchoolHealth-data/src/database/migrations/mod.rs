// Schema migrations for the SQLite store
mod sqlite;

pub use sqlite::run_migrations;

/// Tables holding application data, in restore order.
///
/// `backups` is excluded so a restore never rewrites the snapshot catalogue.
pub const APPLICATION_TABLES: &[&str] = &[
    "accounts",
    "doctors",
    "exam_sessions",
    "edit_requests",
    "physical_fitness",
    "abnormalities",
    "prescriptions",
    "drugs",
    "news",
    "conversations",
    "messages",
];
