use async_trait::async_trait;
use rusqlite::{params, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::{expect_affected, optional};
use crate::database::DatabasePool;
use crate::models::DoctorRecord;

/// Repository trait for doctors
#[async_trait]
pub trait DoctorRepositoryTrait {
    async fn create(&self, doctor: &DoctorRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<DoctorRecord>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<DoctorRecord>, RepositoryError>;
    /// List doctors by name, optionally only those currently available
    async fn list(&self, only_available: bool) -> Result<Vec<DoctorRecord>, RepositoryError>;
    async fn update(&self, doctor: &DoctorRecord) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// SQLite-backed doctor repository
#[derive(Debug, Clone)]
pub struct DoctorRepository {
    pool: DatabasePool,
}

impl DoctorRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, email, password_hash, image, speciality, degree,
    experience, about, fees, address_line1, address_line2, available, created_at FROM doctors";

fn map_row(row: &Row<'_>) -> rusqlite::Result<DoctorRecord> {
    Ok(DoctorRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        speciality: row.get(5)?,
        degree: row.get(6)?,
        experience: row.get(7)?,
        about: row.get(8)?,
        fees: row.get(9)?,
        address_line1: row.get(10)?,
        address_line2: row.get(11)?,
        available: row.get(12)?,
        created_at: row.get(13)?,
    })
}

#[async_trait]
impl DoctorRepositoryTrait for DoctorRepository {
    async fn create(&self, d: &DoctorRecord) -> Result<(), RepositoryError> {
        debug!("Storing doctor: id={}", d.id);
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO doctors (id, name, email, password_hash, image, speciality, degree, experience,
                about, fees, address_line1, address_line2, available, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                d.id, d.name, d.email, d.password_hash, d.image, d.speciality, d.degree, d.experience,
                d.about, d.fees, d.address_line1, d.address_line2, d.available, d.created_at,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DoctorRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), [id], map_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<DoctorRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE email = ?1", SELECT_COLUMNS), [email], map_row))
    }

    async fn list(&self, only_available: bool) -> Result<Vec<DoctorRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 = 0 OR available = 1) ORDER BY name COLLATE NOCASE",
            SELECT_COLUMNS
        ))?;
        let doctors = stmt
            .query_map([only_available], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(doctors)
    }

    async fn update(&self, d: &DoctorRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE doctors SET name = ?2, image = ?3, speciality = ?4, degree = ?5, experience = ?6,
                about = ?7, fees = ?8, address_line1 = ?9, address_line2 = ?10, available = ?11
             WHERE id = ?1",
            params![
                d.id, d.name, d.image, d.speciality, d.degree, d.experience, d.about, d.fees,
                d.address_line1, d.address_line2, d.available,
            ],
        )?;
        expect_affected(affected, "doctor", &d.id)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute("DELETE FROM doctors WHERE id = ?1", [id])?;
        expect_affected(affected, "doctor", id)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use chrono::Utc;

    fn doctor(id: &str, email: &str, available: bool) -> DoctorRecord {
        DoctorRecord {
            id: id.to_string(),
            name: format!("Dr {}", id),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            image: None,
            speciality: "General physician".to_string(),
            degree: "MBBS".to_string(),
            experience: "4 Years".to_string(),
            about: "School clinic".to_string(),
            fees: 50.0,
            address_line1: "Clinic A".to_string(),
            address_line2: String::new(),
            available,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_only_available() {
        let repo = DoctorRepository::new(create_in_memory_pool().unwrap());
        repo.create(&doctor("d1", "d1@clinic.org", true)).await.unwrap();
        repo.create(&doctor("d2", "d2@clinic.org", false)).await.unwrap();

        assert_eq!(repo.list(false).await.unwrap().len(), 2);
        let available = repo.list(true).await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, "d1");
    }

    #[tokio::test]
    async fn test_update_availability() {
        let repo = DoctorRepository::new(create_in_memory_pool().unwrap());
        let mut record = doctor("d1", "d1@clinic.org", true);
        repo.create(&record).await.unwrap();

        record.available = false;
        repo.update(&record).await.unwrap();
        let stored = repo.find_by_id("d1").await.unwrap().unwrap();
        assert!(!stored.available);
    }
}
