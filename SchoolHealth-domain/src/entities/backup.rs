use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Retention used for manual backups
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Retention used for scheduled backups
pub const SCHEDULED_RETENTION_DAYS: i64 = 7;

text_enum! {
    BackupType {
        Manual => "manual",
        Automatic => "automatic",
        Scheduled => "scheduled",
    }
}

text_enum! {
    BackupStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Corrupted => "corrupted",
    }
}

/// Row count captured for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CollectionStat {
    pub name: String,
    pub row_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Backup {
    pub backup_id: String,
    pub name: String,
    pub backup_type: BackupType,
    pub status: BackupStatus,
    pub size: i64,
    pub collections: Vec<CollectionStat>,
    pub created_by: String,
    pub file_path: Option<String>,
    /// SHA-256 of the archive, hex encoded
    pub checksum: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub auto_delete_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateBackupRequest {
    pub name: Option<String>,
    pub retention_days: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct BackupStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_size: i64,
    pub latest_backup: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct VerifyOutcome {
    pub backup_id: String,
    pub is_valid: bool,
    pub status: BackupStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RestoreOutcome {
    pub backup_id: String,
    pub rows_restored: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CleanupOutcome {
    pub deleted: usize,
}

/// Contents of `manifest.json` inside each archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_id: String,
    pub name: String,
    pub backup_type: BackupType,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub collections: Vec<CollectionStat>,
    pub app_version: String,
}
