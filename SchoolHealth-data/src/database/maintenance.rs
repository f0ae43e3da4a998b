//! Snapshot and restore helpers used by the backup service

use std::path::Path;

use tracing::{debug, info};

use super::connection::{DatabaseError, DatabasePool};
use super::migrations::APPLICATION_TABLES;

/// Row count of every application table
pub fn table_counts(pool: &DatabasePool) -> Result<Vec<(String, i64)>, DatabaseError> {
    let conn = pool.conn()?;
    let mut counts = Vec::with_capacity(APPLICATION_TABLES.len());

    for table in APPLICATION_TABLES {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        counts.push((table.to_string(), count));
    }

    Ok(counts)
}

/// Write a consistent copy of the database to `target`.
///
/// The target file must not exist yet.
pub fn snapshot_to(pool: &DatabasePool, target: &Path) -> Result<(), DatabaseError> {
    if target.exists() {
        return Err(DatabaseError::SnapshotExists(target.to_path_buf()));
    }

    let conn = pool.conn()?;
    let target = target.to_string_lossy().to_string();
    conn.execute("VACUUM INTO ?1", [&target])?;
    info!("Database snapshot written to {}", target);
    Ok(())
}

/// Replace the contents of every application table with the rows in `source`.
///
/// All tables are rewritten inside one transaction, so a failed restore
/// leaves the live data untouched. Returns the number of rows copied.
pub fn restore_from(pool: &DatabasePool, source: &Path) -> Result<usize, DatabaseError> {
    let mut conn = pool.conn()?;
    let source = source.to_string_lossy().to_string();

    conn.execute("ATTACH DATABASE ?1 AS restore_src", [&source])?;

    let copied = (|| -> Result<usize, DatabaseError> {
        let tx = conn.transaction()?;
        let mut copied = 0;
        for table in APPLICATION_TABLES {
            tx.execute(&format!("DELETE FROM main.{}", table), [])?;
            let rows = tx.execute(
                &format!("INSERT INTO main.{table} SELECT * FROM restore_src.{table}"),
                [],
            )?;
            debug!("Restored {} rows into {}", rows, table);
            copied += rows;
        }
        tx.commit()?;
        Ok(copied)
    })();

    conn.execute("DETACH DATABASE restore_src", [])?;

    let copied = copied?;
    info!("Restored {} rows from {}", copied, source);
    Ok(copied)
}
