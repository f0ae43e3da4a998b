use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::optional;
use crate::database::DatabasePool;
use crate::models::PhysicalFitnessRecord;

/// Repository trait for physical-fitness measurements
#[async_trait]
pub trait PhysicalFitnessRepositoryTrait {
    /// Insert or update the record identified by (student, follow date, session).
    ///
    /// Returns the stored row; on update it keeps the original id and creation time.
    async fn upsert(&self, record: &PhysicalFitnessRecord) -> Result<PhysicalFitnessRecord, RepositoryError>;

    /// Insert a batch of new records in one transaction
    async fn insert_many(&self, records: &[PhysicalFitnessRecord]) -> Result<usize, RepositoryError>;

    /// List records, optionally restricted to one exam session
    async fn list(&self, exam_session_id: Option<&str>) -> Result<Vec<PhysicalFitnessRecord>, RepositoryError>;

    /// Records for one student, newest first
    async fn list_by_student(
        &self,
        student_id: &str,
        exam_session_id: Option<&str>,
    ) -> Result<Vec<PhysicalFitnessRecord>, RepositoryError>;

    /// Student ids that already have a record in a session
    async fn student_ids_in_session(&self, exam_session_id: &str) -> Result<HashSet<String>, RepositoryError>;

    /// Number of records per exam session
    async fn count_by_session(&self) -> Result<HashMap<String, i64>, RepositoryError>;
}

/// SQLite-backed physical-fitness repository
#[derive(Debug, Clone)]
pub struct PhysicalFitnessRepository {
    pool: DatabasePool,
}

impl PhysicalFitnessRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, exam_session_id, student_id, cohort, gender, follow_date,
    height, weight, z_score_height, height_rating, z_score_weight, weight_rating, z_score_weight_height,
    bmi, bmi_rating, systolic, diastolic, blood_pressure_rating, heart_rate, heart_rate_rating,
    created_at, updated_at FROM physical_fitness";

fn map_row(row: &Row<'_>) -> rusqlite::Result<PhysicalFitnessRecord> {
    Ok(PhysicalFitnessRecord {
        id: row.get(0)?,
        exam_session_id: row.get(1)?,
        student_id: row.get(2)?,
        cohort: row.get(3)?,
        gender: row.get(4)?,
        follow_date: row.get(5)?,
        height: row.get(6)?,
        weight: row.get(7)?,
        z_score_height: row.get(8)?,
        height_rating: row.get(9)?,
        z_score_weight: row.get(10)?,
        weight_rating: row.get(11)?,
        z_score_weight_height: row.get(12)?,
        bmi: row.get(13)?,
        bmi_rating: row.get(14)?,
        systolic: row.get(15)?,
        diastolic: row.get(16)?,
        blood_pressure_rating: row.get(17)?,
        heart_rate: row.get(18)?,
        heart_rate_rating: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

/// Insert, or overwrite the measurement columns on a natural-key collision
fn write_record(conn: &Connection, r: &PhysicalFitnessRecord, upsert: bool) -> Result<(), RepositoryError> {
    let conflict = if upsert {
        "ON CONFLICT (student_id, follow_date, exam_session_id) DO UPDATE SET
            cohort = excluded.cohort, gender = excluded.gender,
            height = excluded.height, weight = excluded.weight,
            z_score_height = excluded.z_score_height, height_rating = excluded.height_rating,
            z_score_weight = excluded.z_score_weight, weight_rating = excluded.weight_rating,
            z_score_weight_height = excluded.z_score_weight_height,
            bmi = excluded.bmi, bmi_rating = excluded.bmi_rating,
            systolic = excluded.systolic, diastolic = excluded.diastolic,
            blood_pressure_rating = excluded.blood_pressure_rating,
            heart_rate = excluded.heart_rate, heart_rate_rating = excluded.heart_rate_rating,
            updated_at = excluded.updated_at"
    } else {
        ""
    };

    conn.execute(
        &format!(
            "INSERT INTO physical_fitness (id, exam_session_id, student_id, cohort, gender, follow_date,
                height, weight, z_score_height, height_rating, z_score_weight, weight_rating,
                z_score_weight_height, bmi, bmi_rating, systolic, diastolic, blood_pressure_rating,
                heart_rate, heart_rate_rating, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
                ?19, ?20, ?21, ?22) {}",
            conflict
        ),
        params![
            r.id, r.exam_session_id, r.student_id, r.cohort, r.gender, r.follow_date,
            r.height, r.weight, r.z_score_height, r.height_rating, r.z_score_weight, r.weight_rating,
            r.z_score_weight_height, r.bmi, r.bmi_rating, r.systolic, r.diastolic,
            r.blood_pressure_rating, r.heart_rate, r.heart_rate_rating, r.created_at, r.updated_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl PhysicalFitnessRepositoryTrait for PhysicalFitnessRepository {
    async fn upsert(&self, record: &PhysicalFitnessRecord) -> Result<PhysicalFitnessRecord, RepositoryError> {
        debug!(
            "Upserting physical fitness record: student={}, session={}",
            record.student_id, record.exam_session_id
        );
        let conn = self.pool.conn()?;
        write_record(&conn, record, true)?;

        let stored = optional(conn.query_row(
            &format!(
                "{} WHERE student_id = ?1 AND follow_date = ?2 AND exam_session_id = ?3",
                SELECT_COLUMNS
            ),
            params![record.student_id, record.follow_date, record.exam_session_id],
            map_row,
        ))?;

        stored.ok_or_else(|| RepositoryError::NotFound(format!("physical fitness record {}", record.id)))
    }

    async fn insert_many(&self, records: &[PhysicalFitnessRecord]) -> Result<usize, RepositoryError> {
        let mut conn = self.pool.conn()?;
        let tx = conn.transaction()?;
        for record in records {
            write_record(&tx, record, false)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    async fn list(&self, exam_session_id: Option<&str>) -> Result<Vec<PhysicalFitnessRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR exam_session_id = ?1) ORDER BY student_id, follow_date",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map([exam_session_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn list_by_student(
        &self,
        student_id: &str,
        exam_session_id: Option<&str>,
    ) -> Result<Vec<PhysicalFitnessRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE student_id = ?1 AND (?2 IS NULL OR exam_session_id = ?2)
             ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![student_id, exam_session_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn student_ids_in_session(&self, exam_session_id: &str) -> Result<HashSet<String>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT student_id FROM physical_fitness WHERE exam_session_id = ?1")?;
        let ids = stmt
            .query_map([exam_session_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    async fn count_by_session(&self) -> Result<HashMap<String, i64>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare("SELECT exam_session_id, COUNT(*) FROM physical_fitness GROUP BY exam_session_id")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use chrono::Utc;

    fn record(id: &str, student_id: &str, session: &str, height: f64) -> PhysicalFitnessRecord {
        PhysicalFitnessRecord {
            id: id.to_string(),
            exam_session_id: session.to_string(),
            student_id: student_id.to_string(),
            cohort: Some("K47".to_string()),
            gender: Some("female".to_string()),
            follow_date: "2024-09-01".to_string(),
            height: Some(height),
            weight: Some(55.0),
            z_score_height: None,
            height_rating: None,
            z_score_weight: None,
            weight_rating: None,
            z_score_weight_height: None,
            bmi: None,
            bmi_rating: None,
            systolic: None,
            diastolic: None,
            blood_pressure_rating: None,
            heart_rate: None,
            heart_rate_rating: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_natural_key() {
        let repo = PhysicalFitnessRepository::new(create_in_memory_pool().unwrap());

        let first = repo.upsert(&record("r1", "SV001", "s1", 160.0)).await.unwrap();
        let second = repo.upsert(&record("r2", "SV001", "s1", 162.5)).await.unwrap();

        assert_eq!(first.id, "r1");
        assert_eq!(second.id, "r1");
        assert_eq!(second.height, Some(162.5));
        assert_eq!(repo.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_queries() {
        let repo = PhysicalFitnessRepository::new(create_in_memory_pool().unwrap());
        repo.insert_many(&[
            record("r1", "SV001", "s1", 160.0),
            record("r2", "SV002", "s1", 170.0),
            record("r3", "SV001", "s2", 161.0),
        ])
        .await
        .unwrap();

        let ids = repo.student_ids_in_session("s1").await.unwrap();
        assert!(ids.contains("SV001") && ids.contains("SV002"));

        let counts = repo.count_by_session().await.unwrap();
        assert_eq!(counts.get("s1"), Some(&2));
        assert_eq!(counts.get("s2"), Some(&1));

        assert_eq!(repo.list(Some("s2")).await.unwrap().len(), 1);
        assert_eq!(repo.list_by_student("SV001", None).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_student("SV001", Some("s1")).await.unwrap().len(), 1);
    }
}
