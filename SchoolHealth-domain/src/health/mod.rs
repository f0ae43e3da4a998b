//! Liveness and readiness of the backing store

use std::collections::BTreeMap;

use school_health_data::database::{self, DatabasePool};
use tracing::warn;

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Healthy,
    /// Serving requests, but something needs attention
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub status: Status,
    pub details: Option<String>,
}

impl Check {
    fn new(status: Status, details: Option<String>) -> Self {
        Self { status, details }
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: Status,
    pub checks: BTreeMap<&'static str, Check>,
}

impl HealthReport {
    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.get(name)
    }
}

/// Run a trivial query against `pool`.
///
/// The in-memory fallback answers but counts as degraded, since nothing it
/// holds survives a restart.
pub fn database_check(pool: &DatabasePool) -> Check {
    let outcome = pool
        .conn()
        .map_err(|e| format!("no connection: {}", e))
        .and_then(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| format!("test query failed: {}", e))
        });

    match outcome {
        Err(reason) => {
            warn!("Database check failed: {}", reason);
            Check::new(Status::Unhealthy, Some(reason))
        }
        Ok(_) if pool.is_in_memory() => Check::new(
            Status::Degraded,
            Some("in-memory fallback database, records are lost on restart".to_string()),
        ),
        Ok(_) => Check::new(Status::Healthy, Some(database::describe_pool(pool))),
    }
}

pub async fn system_health(pool: &DatabasePool) -> HealthReport {
    let mut checks = BTreeMap::new();
    checks.insert("database", database_check(pool));
    checks.insert("api", Check::new(Status::Healthy, None));

    let status = checks.values().map(|c| c.status).max().unwrap_or(Status::Healthy);
    HealthReport { status, checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_health_data::database::create_in_memory_pool;

    #[test]
    fn test_worst_status_wins() {
        assert!(Status::Unhealthy > Status::Degraded);
        assert!(Status::Degraded > Status::Healthy);
    }

    #[tokio::test]
    async fn test_in_memory_database_is_degraded() {
        let pool = create_in_memory_pool().unwrap();
        let report = system_health(&pool).await;

        assert_eq!(report.status, Status::Degraded);
        assert_eq!(report.check("database").map(|c| c.status), Some(Status::Degraded));
        assert_eq!(report.check("api").map(|c| c.status), Some(Status::Healthy));
    }
}
