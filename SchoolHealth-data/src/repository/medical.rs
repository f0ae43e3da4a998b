use async_trait::async_trait;
use rusqlite::{params, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::{expect_affected, json_column, optional, to_json};
use crate::database::DatabasePool;
use crate::models::{AbnormalityRecord, PrescriptionRecord};

/// Repository trait for abnormalities found during exams
#[async_trait]
pub trait AbnormalityRepositoryTrait {
    async fn create(&self, abnormality: &AbnormalityRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<AbnormalityRecord>, RepositoryError>;
    /// All abnormalities, newest exam date first
    async fn list(&self) -> Result<Vec<AbnormalityRecord>, RepositoryError>;
    async fn list_by_student(&self, student_id: &str) -> Result<Vec<AbnormalityRecord>, RepositoryError>;
    /// The most recently recorded abnormalities
    async fn latest(&self, limit: usize) -> Result<Vec<AbnormalityRecord>, RepositoryError>;
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// Repository trait for prescriptions
#[async_trait]
pub trait PrescriptionRepositoryTrait {
    async fn create(&self, prescription: &PrescriptionRecord) -> Result<(), RepositoryError>;
    async fn list_by_student(&self, student_id: &str) -> Result<Vec<PrescriptionRecord>, RepositoryError>;
    async fn list_by_abnormality(&self, abnormality_id: &str) -> Result<Vec<PrescriptionRecord>, RepositoryError>;
}

/// SQLite-backed abnormality repository
#[derive(Debug, Clone)]
pub struct AbnormalityRepository {
    pool: DatabasePool,
}

impl AbnormalityRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn query(&self, sql_tail: &str, param: Option<&str>) -> Result<Vec<AbnormalityRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!("{} {}", ABNORMALITY_COLUMNS, sql_tail))?;
        let records = match param {
            Some(value) => stmt.query_map([value], map_abnormality)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], map_abnormality)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(records)
    }
}

const ABNORMALITY_COLUMNS: &str = "SELECT id, student_id, student_name, doctor_name, exam_date, symptoms,
    temporary_treatment, created_at FROM abnormalities";

fn map_abnormality(row: &Row<'_>) -> rusqlite::Result<AbnormalityRecord> {
    Ok(AbnormalityRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_name: row.get(2)?,
        doctor_name: row.get(3)?,
        date: row.get(4)?,
        symptoms: json_column(row, 5)?,
        temporary_treatment: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[async_trait]
impl AbnormalityRepositoryTrait for AbnormalityRepository {
    async fn create(&self, a: &AbnormalityRecord) -> Result<(), RepositoryError> {
        debug!("Storing abnormality: id={}, student={}", a.id, a.student_id);
        let symptoms = to_json(&a.symptoms)?;
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO abnormalities (id, student_id, student_name, doctor_name, exam_date, symptoms,
                temporary_treatment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                a.id, a.student_id, a.student_name, a.doctor_name, a.date, symptoms,
                a.temporary_treatment, a.created_at,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AbnormalityRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", ABNORMALITY_COLUMNS), [id], map_abnormality))
    }

    async fn list(&self) -> Result<Vec<AbnormalityRecord>, RepositoryError> {
        self.query("ORDER BY exam_date DESC, created_at DESC", None)
    }

    async fn list_by_student(&self, student_id: &str) -> Result<Vec<AbnormalityRecord>, RepositoryError> {
        self.query(
            "WHERE student_id = ?1 ORDER BY exam_date DESC, created_at DESC",
            Some(student_id),
        )
    }

    async fn latest(&self, limit: usize) -> Result<Vec<AbnormalityRecord>, RepositoryError> {
        self.query(&format!("ORDER BY created_at DESC LIMIT {}", limit), None)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute("DELETE FROM abnormalities WHERE id = ?1", [id])?;
        expect_affected(affected, "abnormality", id)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM abnormalities", [], |row| row.get(0))?)
    }
}

/// SQLite-backed prescription repository
#[derive(Debug, Clone)]
pub struct PrescriptionRepository {
    pool: DatabasePool,
}

impl PrescriptionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const PRESCRIPTION_COLUMNS: &str = "SELECT id, abnormality_id, student_id, doctor_name, prescription_date,
    diagnosis, notes, medicines, created_at FROM prescriptions";

fn map_prescription(row: &Row<'_>) -> rusqlite::Result<PrescriptionRecord> {
    Ok(PrescriptionRecord {
        id: row.get(0)?,
        abnormality_id: row.get(1)?,
        student_id: row.get(2)?,
        doctor_name: row.get(3)?,
        prescription_date: row.get(4)?,
        diagnosis: row.get(5)?,
        notes: row.get(6)?,
        medicines: json_column(row, 7)?,
        created_at: row.get(8)?,
    })
}

#[async_trait]
impl PrescriptionRepositoryTrait for PrescriptionRepository {
    async fn create(&self, p: &PrescriptionRecord) -> Result<(), RepositoryError> {
        debug!("Storing prescription: id={}, abnormality={}", p.id, p.abnormality_id);
        let medicines = to_json(&p.medicines)?;
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO prescriptions (id, abnormality_id, student_id, doctor_name, prescription_date,
                diagnosis, notes, medicines, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                p.id, p.abnormality_id, p.student_id, p.doctor_name, p.prescription_date,
                p.diagnosis, p.notes, medicines, p.created_at,
            ],
        )?;
        Ok(())
    }

    async fn list_by_student(&self, student_id: &str) -> Result<Vec<PrescriptionRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE student_id = ?1 ORDER BY prescription_date DESC, created_at DESC",
            PRESCRIPTION_COLUMNS
        ))?;
        let records = stmt
            .query_map([student_id], map_prescription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn list_by_abnormality(&self, abnormality_id: &str) -> Result<Vec<PrescriptionRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE abnormality_id = ?1 ORDER BY prescription_date DESC, created_at DESC",
            PRESCRIPTION_COLUMNS
        ))?;
        let records = stmt
            .query_map([abnormality_id], map_prescription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use crate::models::MedicineRecord;
    use chrono::{NaiveDate, Utc};

    fn abnormality(id: &str, student_id: &str, day: u32) -> AbnormalityRecord {
        AbnormalityRecord {
            id: id.to_string(),
            student_id: student_id.to_string(),
            student_name: "Minh".to_string(),
            doctor_name: "Dr Lan".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 10, day).unwrap(),
            symptoms: vec!["cough".to_string(), "fever".to_string()],
            temporary_treatment: "rest".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_abnormalities_newest_first_with_symptoms() {
        let pool = create_in_memory_pool().unwrap();
        let repo = AbnormalityRepository::new(pool);
        repo.create(&abnormality("a1", "SV001", 1)).await.unwrap();
        repo.create(&abnormality("a2", "SV001", 5)).await.unwrap();
        repo.create(&abnormality("a3", "SV002", 3)).await.unwrap();

        let listed = repo.list_by_student("SV001").await.unwrap();
        assert_eq!(listed.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["a2", "a1"]);
        assert_eq!(listed[0].symptoms, vec!["cough", "fever"]);
        assert_eq!(repo.list().await.unwrap()[0].id, "a2");
        assert_eq!(repo.count().await.unwrap(), 3);

        repo.delete("a1").await.unwrap();
        assert!(repo.find_by_id("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prescriptions_by_abnormality() {
        let repo = PrescriptionRepository::new(create_in_memory_pool().unwrap());
        let prescription = PrescriptionRecord {
            id: "p1".to_string(),
            abnormality_id: "a1".to_string(),
            student_id: "SV001".to_string(),
            doctor_name: "Dr Lan".to_string(),
            prescription_date: NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
            diagnosis: "flu".to_string(),
            notes: None,
            medicines: vec![MedicineRecord {
                drug_id: "d1".to_string(),
                dosage: "500mg".to_string(),
                frequency: "2x/day".to_string(),
                duration: "5 days".to_string(),
                instructions: None,
                meal_timing: "after".to_string(),
            }],
            created_at: Utc::now(),
        };
        repo.create(&prescription).await.unwrap();

        let by_abnormality = repo.list_by_abnormality("a1").await.unwrap();
        assert_eq!(by_abnormality, vec![prescription]);
        assert!(repo.list_by_student("SV002").await.unwrap().is_empty());
    }
}
