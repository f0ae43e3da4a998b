use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row count captured for one table at backup time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStat {
    pub name: String,
    pub row_count: i64,
}

/// Storage model for a database backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub backup_id: String,
    pub name: String,
    pub backup_type: String,
    pub status: String,
    pub size: i64,
    pub collections: Vec<TableStat>,
    pub created_by: String,
    pub file_path: Option<String>,
    pub checksum: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub auto_delete_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub retention_days: i64,
}
