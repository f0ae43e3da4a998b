//! Database backups
//!
//! A backup is a zip archive holding a `VACUUM INTO` snapshot of the
//! database plus a `manifest.json`. The archive checksum is stored with the
//! backup record and rechecked before any restore.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use school_health_data::database::{maintenance, DatabasePool};
use school_health_data::models::{BackupRecord, TableStat};
use school_health_data::repository::BackupRepositoryTrait;

use crate::entities::backup::{
    Backup, BackupManifest, BackupStats, BackupStatus, BackupType, CleanupOutcome, CollectionStat,
    CreateBackupRequest, RestoreOutcome, VerifyOutcome, DEFAULT_RETENTION_DAYS, SCHEDULED_RETENTION_DAYS,
};
use crate::entities::conversions;
use crate::errors::{invalid, ServiceError};

const MANIFEST_ENTRY: &str = "manifest.json";
const DATABASE_ENTRY: &str = "database.sqlite";
const SCHEDULE_PERIOD: StdDuration = StdDuration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    pub schedule_enabled: bool,
}

impl BackupConfig {
    pub fn from_env() -> Self {
        let backup_dir = std::env::var("BACKUP_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
            PathBuf::from(data_dir).join("backups")
        });
        let schedule_enabled = std::env::var("BACKUP_SCHEDULE_ENABLED")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(true);

        info!("Backup configuration: dir={}, schedule_enabled={}", backup_dir.display(), schedule_enabled);
        Self { backup_dir, schedule_enabled }
    }
}

/// What the blocking half of a backup produced
struct ArchiveInfo {
    path: PathBuf,
    collections: Vec<CollectionStat>,
    checksum: String,
    size: i64,
}

fn file_checksum(path: &Path) -> AnyResult<String> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {} for checksum", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_archive(snapshot: &Path, manifest: &BackupManifest, out: &Path) -> AnyResult<()> {
    let file = File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    zip.start_file(DATABASE_ENTRY, options)?;
    let mut source = File::open(snapshot).with_context(|| format!("failed to open {}", snapshot.display()))?;
    io::copy(&mut source, &mut zip)?;

    zip.finish()?;
    Ok(())
}

/// Unpack the database snapshot from `archive` into `out`
fn extract_snapshot(archive: &Path, out: &Path) -> AnyResult<BackupManifest> {
    let file = File::open(archive).with_context(|| format!("failed to open {}", archive.display()))?;
    let mut zip = ZipArchive::new(file).context("not a zip archive")?;

    let manifest: BackupManifest = {
        let entry = zip.by_name(MANIFEST_ENTRY).context("archive has no manifest")?;
        serde_json::from_reader(entry).context("manifest is not valid json")?
    };

    let mut entry = zip.by_name(DATABASE_ENTRY).context("archive has no database snapshot")?;
    let mut target = File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    io::copy(&mut entry, &mut target)?;

    Ok(manifest)
}

fn build_archive(pool: &DatabasePool, dir: &Path, mut manifest: BackupManifest) -> AnyResult<ArchiveInfo> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    manifest.collections = maintenance::table_counts(pool)?
        .into_iter()
        .map(|(name, row_count)| CollectionStat { name, row_count })
        .collect();

    let snapshot = dir.join(format!("{}.sqlite", manifest.backup_id));
    let path = dir.join(format!("{}.zip", manifest.backup_id));
    maintenance::snapshot_to(pool, &snapshot)?;
    let written = write_archive(&snapshot, &manifest, &path);
    if let Err(e) = fs::remove_file(&snapshot) {
        warn!("Could not remove snapshot {}: {}", snapshot.display(), e);
    }
    written?;

    let checksum = file_checksum(&path)?;
    let size = fs::metadata(&path)?.len() as i64;
    Ok(ArchiveInfo { path, collections: manifest.collections, checksum, size })
}

fn internal(e: anyhow::Error) -> ServiceError {
    ServiceError::Internal(format!("{:#}", e))
}

pub struct BackupService {
    pool: DatabasePool,
    repository: Arc<dyn BackupRepositoryTrait + Send + Sync>,
    config: BackupConfig,
}

impl BackupService {
    pub fn new(
        pool: DatabasePool,
        repository: Arc<dyn BackupRepositoryTrait + Send + Sync>,
        config: BackupConfig,
    ) -> Self {
        Self { pool, repository, config }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    async fn record(&self, backup_id: &str) -> Result<BackupRecord, ServiceError> {
        self.repository
            .find_by_id(backup_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Backup {} not found", backup_id)))
    }

    /// Snapshot the database into a new archive.
    ///
    /// The record is stored as in progress first; a failure is kept on the
    /// record as `failed` with its message.
    pub async fn create(
        &self,
        request: CreateBackupRequest,
        created_by: &str,
        backup_type: BackupType,
    ) -> Result<Backup, ServiceError> {
        let retention_days = request.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        if retention_days < 1 {
            return Err(invalid("retention_days: Retention must be at least one day"));
        }

        let start_time = Utc::now();
        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("backup-{}", start_time.format("%Y%m%d-%H%M%S")));

        let mut record = BackupRecord {
            backup_id: Uuid::new_v4().to_string(),
            name,
            backup_type: backup_type.as_str().to_string(),
            status: BackupStatus::InProgress.as_str().to_string(),
            size: 0,
            collections: Vec::new(),
            created_by: created_by.to_string(),
            file_path: None,
            checksum: None,
            start_time,
            end_time: None,
            duration_ms: None,
            error_message: None,
            auto_delete_at: None,
            is_verified: false,
            retention_days,
        };
        self.repository.create(&record).await?;
        info!("Starting {} backup {}", backup_type, record.backup_id);

        let manifest = BackupManifest {
            backup_id: record.backup_id.clone(),
            name: record.name.clone(),
            backup_type,
            created_by: created_by.to_string(),
            created_at: start_time,
            collections: Vec::new(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let pool = self.pool.clone();
        let dir = self.config.backup_dir.clone();
        let outcome = tokio::task::spawn_blocking(move || build_archive(&pool, &dir, manifest))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|built| built);

        let end_time = Utc::now();
        record.end_time = Some(end_time);
        record.duration_ms = Some((end_time - start_time).num_milliseconds());

        match outcome {
            Ok(archive) => {
                record.status = BackupStatus::Completed.as_str().to_string();
                record.file_path = Some(archive.path.to_string_lossy().to_string());
                record.checksum = Some(archive.checksum);
                record.size = archive.size;
                record.collections = archive
                    .collections
                    .into_iter()
                    .map(|c| TableStat { name: c.name, row_count: c.row_count })
                    .collect();
                record.auto_delete_at = Some(start_time + Duration::days(retention_days));
                self.repository.update(&record).await?;
                info!("Backup {} completed ({} bytes)", record.backup_id, record.size);
                conversions::convert_to_domain_backup(record)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("Backup {} failed: {}", record.backup_id, message);
                record.status = BackupStatus::Failed.as_str().to_string();
                record.error_message = Some(message.clone());
                self.repository.update(&record).await?;
                Err(ServiceError::Internal(format!("Backup failed: {}", message)))
            }
        }
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<Backup>, ServiceError> {
        self.repository
            .list()
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_backup)
            .collect()
    }

    pub async fn details(&self, backup_id: &str) -> Result<Backup, ServiceError> {
        conversions::convert_to_domain_backup(self.record(backup_id).await?)
    }

    pub async fn stats(&self) -> Result<BackupStats, ServiceError> {
        let backups = self.list().await?;
        let completed: Vec<&Backup> = backups.iter().filter(|b| b.status == BackupStatus::Completed).collect();

        Ok(BackupStats {
            total: backups.len(),
            completed: completed.len(),
            failed: backups.iter().filter(|b| b.status == BackupStatus::Failed).count(),
            total_size: completed.iter().map(|b| b.size).sum(),
            latest_backup: backups.iter().map(|b| b.start_time).max(),
        })
    }

    /// Archive path of a completed backup, for download
    pub async fn download_path(&self, backup_id: &str) -> Result<PathBuf, ServiceError> {
        let record = self.record(backup_id).await?;
        let path = record
            .file_path
            .filter(|_| record.status == BackupStatus::Completed.as_str())
            .map(PathBuf::from)
            .filter(|p| p.is_file())
            .ok_or_else(|| ServiceError::NotFound(format!("Backup {} has no archive to download", backup_id)))?;
        Ok(path)
    }

    /// Recompute the archive checksum; a mismatch or a missing file marks the backup corrupted
    pub async fn verify(&self, backup_id: &str) -> Result<VerifyOutcome, ServiceError> {
        let mut record = self.record(backup_id).await?;
        let (Some(path), Some(expected)) = (record.file_path.clone(), record.checksum.clone()) else {
            return Err(invalid(format!("Backup {} has no archive to verify", backup_id)));
        };

        let path = PathBuf::from(path);
        let actual = tokio::task::spawn_blocking(move || file_checksum(&path))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let is_valid = matches!(&actual, Ok(sum) if *sum == expected);
        if is_valid {
            record.is_verified = true;
        } else {
            warn!("Backup {} failed verification", backup_id);
            record.is_verified = false;
            record.status = BackupStatus::Corrupted.as_str().to_string();
        }
        self.repository.update(&record).await?;

        let backup = conversions::convert_to_domain_backup(record)?;
        Ok(VerifyOutcome { backup_id: backup.backup_id, is_valid, status: backup.status })
    }

    /// Replace the application data with the contents of a verified backup
    pub async fn restore(&self, backup_id: &str) -> Result<RestoreOutcome, ServiceError> {
        let verified = self.verify(backup_id).await?;
        if !verified.is_valid {
            return Err(invalid(format!("Backup {} failed verification and cannot be restored", backup_id)));
        }
        let archive = self.download_path(backup_id).await?;

        let pool = self.pool.clone();
        let scratch = self.config.backup_dir.join(format!("{}-restore-{}.sqlite", backup_id, Uuid::new_v4()));
        let rows_restored = tokio::task::spawn_blocking(move || -> AnyResult<usize> {
            let restored = extract_snapshot(&archive, &scratch)
                .and_then(|_| maintenance::restore_from(&pool, &scratch).map_err(anyhow::Error::from));
            if let Err(e) = fs::remove_file(&scratch) {
                warn!("Could not remove {}: {}", scratch.display(), e);
            }
            restored
        })
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .map_err(internal)?;

        info!("Restored backup {} ({} rows)", backup_id, rows_restored);
        Ok(RestoreOutcome { backup_id: backup_id.to_string(), rows_restored })
    }

    pub async fn delete(&self, backup_id: &str) -> Result<(), ServiceError> {
        let record = self.record(backup_id).await?;
        if let Some(path) = record.file_path.as_deref() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(ServiceError::Internal(format!("Failed to remove {}: {}", path, e))),
            }
        }
        self.repository.delete(backup_id).await?;
        info!("Deleted backup {}", backup_id);
        Ok(())
    }

    /// Delete completed backups past their `auto_delete_at`
    pub async fn cleanup(&self) -> Result<CleanupOutcome, ServiceError> {
        self.cleanup_at(Utc::now()).await
    }

    async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupOutcome, ServiceError> {
        let mut deleted = 0;
        for record in self.repository.expired(now).await? {
            self.delete(&record.backup_id).await?;
            deleted += 1;
        }
        if deleted > 0 {
            info!("Cleaned up {} expired backups", deleted);
        }
        Ok(CleanupOutcome { deleted })
    }
}

/// Daily automatic backup followed by cleanup; the first run is one day after start
pub fn start_backup_scheduler(service: Arc<BackupService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + SCHEDULE_PERIOD;
        let mut ticker = tokio::time::interval_at(start, SCHEDULE_PERIOD);
        loop {
            ticker.tick().await;
            let request = CreateBackupRequest { name: None, retention_days: Some(SCHEDULED_RETENTION_DAYS) };
            if let Err(e) = service.create(request, "system", BackupType::Automatic).await {
                error!("Scheduled backup failed: {}", e);
            }
            if let Err(e) = service.cleanup().await {
                error!("Backup cleanup failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::models::NewsRecord;
    use school_health_data::repository::{BackupRepository, NewsRepository, NewsRepositoryTrait};

    struct Fixture {
        service: BackupService,
        news: NewsRepository,
        dir: PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.dir).ok();
        }
    }

    fn fixture() -> Fixture {
        let pool = create_in_memory_pool().unwrap();
        let dir = std::env::temp_dir().join(format!("school-health-backups-{}", Uuid::new_v4()));
        let config = BackupConfig { backup_dir: dir.clone(), schedule_enabled: false };
        Fixture {
            service: BackupService::new(pool.clone(), Arc::new(BackupRepository::new(pool.clone())), config),
            news: NewsRepository::new(pool),
            dir,
        }
    }

    async fn publish(news: &NewsRepository, id: &str) {
        news.create(&NewsRecord {
            id: id.to_string(),
            title: "Flu season".to_string(),
            category: "health".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            content: "Get vaccinated".to_string(),
            file: "/uploads/flu.pdf".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    }

    fn manual(name: &str) -> CreateBackupRequest {
        CreateBackupRequest { name: Some(name.to_string()), retention_days: None }
    }

    #[tokio::test]
    async fn test_create_writes_archive_with_counts() {
        let f = fixture();
        publish(&f.news, "n1").await;

        let backup = f.service.create(manual("nightly"), "admin", BackupType::Manual).await.unwrap();
        assert_eq!(backup.status, BackupStatus::Completed);
        assert_eq!(backup.retention_days, DEFAULT_RETENTION_DAYS);
        assert!(backup.size > 0);
        assert_eq!(backup.checksum.as_ref().unwrap().len(), 64);
        assert!(backup.collections.contains(&CollectionStat { name: "news".to_string(), row_count: 1 }));

        let path = f.service.download_path(&backup.backup_id).await.unwrap();
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let manifest: BackupManifest = serde_json::from_reader(zip.by_name(MANIFEST_ENTRY).unwrap()).unwrap();
        assert_eq!(manifest.name, "nightly");
        assert!(zip.by_name(DATABASE_ENTRY).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_zero_retention() {
        let f = fixture();
        let request = CreateBackupRequest { name: None, retention_days: Some(0) };
        let err = f.service.create(request, "admin", BackupType::Manual).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_verify_detects_tampering() {
        let f = fixture();
        let backup = f.service.create(manual("b"), "admin", BackupType::Manual).await.unwrap();

        let outcome = f.service.verify(&backup.backup_id).await.unwrap();
        assert!(outcome.is_valid);
        assert!(f.service.details(&backup.backup_id).await.unwrap().is_verified);

        fs::write(backup.file_path.as_ref().unwrap(), b"tampered").unwrap();
        let outcome = f.service.verify(&backup.backup_id).await.unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(outcome.status, BackupStatus::Corrupted);

        let err = f.service.restore(&backup.backup_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_restore_brings_back_data_and_keeps_backup_records() {
        let f = fixture();
        publish(&f.news, "n1").await;
        let backup = f.service.create(manual("before"), "admin", BackupType::Manual).await.unwrap();

        publish(&f.news, "n2").await;
        f.service.create(manual("after"), "admin", BackupType::Manual).await.unwrap();
        assert_eq!(f.news.count().await.unwrap(), 2);

        let outcome = f.service.restore(&backup.backup_id).await.unwrap();
        assert_eq!(outcome.rows_restored, 1);
        assert_eq!(f.news.count().await.unwrap(), 1);
        assert_eq!(f.service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_cleanup_and_stats() {
        let f = fixture();
        let kept = f.service.create(manual("kept"), "admin", BackupType::Manual).await.unwrap();
        let short = CreateBackupRequest { name: None, retention_days: Some(1) };
        let expiring = f.service.create(short, "system", BackupType::Automatic).await.unwrap();

        let stats = f.service.stats().await.unwrap();
        assert_eq!((stats.total, stats.completed, stats.failed), (2, 2, 0));
        assert_eq!(stats.total_size, kept.size + expiring.size);

        let outcome = f.service.cleanup_at(Utc::now() + Duration::days(2)).await.unwrap();
        assert_eq!(outcome.deleted, 1);
        assert!(!Path::new(expiring.file_path.as_ref().unwrap()).exists());

        f.service.delete(&kept.backup_id).await.unwrap();
        assert!(matches!(f.service.details(&kept.backup_id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(f.service.stats().await.unwrap(), BackupStats::default());
    }
}
