use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::{expect_affected, optional};
use crate::database::DatabasePool;
use crate::models::DrugRecord;

/// Repository trait for the drug inventory
#[async_trait]
pub trait DrugRepositoryTrait {
    async fn create(&self, drug: &DrugRecord) -> Result<(), RepositoryError>;
    /// Insert a batch of drugs in one transaction
    async fn insert_many(&self, drugs: &[DrugRecord]) -> Result<usize, RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<DrugRecord>, RepositoryError>;
    /// All drugs ordered by name
    async fn list(&self) -> Result<Vec<DrugRecord>, RepositoryError>;
    async fn update(&self, drug: &DrugRecord) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
    /// Drugs whose stock is at or below the threshold
    async fn low_stock(&self, threshold: i64) -> Result<Vec<DrugRecord>, RepositoryError>;
    /// Drugs expiring on or before the given date, soonest first
    async fn expiring_before(&self, date: NaiveDate) -> Result<Vec<DrugRecord>, RepositoryError>;
}

/// SQLite-backed drug repository
#[derive(Debug, Clone)]
pub struct DrugRepository {
    pool: DatabasePool,
}

impl DrugRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, image, name, code, drug_type, unit, inventory_quantity,
    expiry_date, supplier_name, notes, created_at FROM drugs";

fn map_row(row: &Row<'_>) -> rusqlite::Result<DrugRecord> {
    Ok(DrugRecord {
        id: row.get(0)?,
        image: row.get(1)?,
        name: row.get(2)?,
        code: row.get(3)?,
        drug_type: row.get(4)?,
        unit: row.get(5)?,
        inventory_quantity: row.get(6)?,
        expiry_date: row.get(7)?,
        supplier_name: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn insert(conn: &Connection, d: &DrugRecord) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO drugs (id, image, name, code, drug_type, unit, inventory_quantity, expiry_date,
            supplier_name, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            d.id, d.image, d.name, d.code, d.drug_type, d.unit, d.inventory_quantity, d.expiry_date,
            d.supplier_name, d.notes, d.created_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl DrugRepositoryTrait for DrugRepository {
    async fn create(&self, drug: &DrugRecord) -> Result<(), RepositoryError> {
        debug!("Storing drug: id={}, code={}", drug.id, drug.code);
        let conn = self.pool.conn()?;
        insert(&conn, drug)
    }

    async fn insert_many(&self, drugs: &[DrugRecord]) -> Result<usize, RepositoryError> {
        let mut conn = self.pool.conn()?;
        let tx = conn.transaction()?;
        for drug in drugs {
            insert(&tx, drug)?;
        }
        tx.commit()?;
        debug!("Stored {} drugs", drugs.len());
        Ok(drugs.len())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DrugRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), [id], map_row))
    }

    async fn list(&self) -> Result<Vec<DrugRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY name COLLATE NOCASE", SELECT_COLUMNS))?;
        let drugs = stmt.query_map([], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(drugs)
    }

    async fn update(&self, d: &DrugRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE drugs SET image = ?2, name = ?3, code = ?4, drug_type = ?5, unit = ?6,
                inventory_quantity = ?7, expiry_date = ?8, supplier_name = ?9, notes = ?10
             WHERE id = ?1",
            params![
                d.id, d.image, d.name, d.code, d.drug_type, d.unit, d.inventory_quantity,
                d.expiry_date, d.supplier_name, d.notes,
            ],
        )?;
        expect_affected(affected, "drug", &d.id)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute("DELETE FROM drugs WHERE id = ?1", [id])?;
        expect_affected(affected, "drug", id)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM drugs", [], |row| row.get(0))?)
    }

    async fn low_stock(&self, threshold: i64) -> Result<Vec<DrugRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE inventory_quantity <= ?1 ORDER BY inventory_quantity, name",
            SELECT_COLUMNS
        ))?;
        let drugs = stmt.query_map([threshold], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(drugs)
    }

    async fn expiring_before(&self, date: NaiveDate) -> Result<Vec<DrugRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE expiry_date <= ?1 ORDER BY expiry_date, name",
            SELECT_COLUMNS
        ))?;
        let drugs = stmt.query_map([date], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(drugs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use chrono::Utc;

    fn drug(id: &str, quantity: i64, expiry: NaiveDate) -> DrugRecord {
        DrugRecord {
            id: id.to_string(),
            image: None,
            name: format!("Drug {}", id),
            code: format!("C-{}", id),
            drug_type: "tablet".to_string(),
            unit: "box".to_string(),
            inventory_quantity: quantity,
            expiry_date: expiry,
            supplier_name: "Pharma".to_string(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_alert_queries() {
        let repo = DrugRepository::new(create_in_memory_pool().unwrap());
        let soon = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let later = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        repo.insert_many(&[drug("a", 5, later), drug("b", 50, soon), drug("c", 10, later)])
            .await
            .unwrap();

        let low: Vec<_> = repo.low_stock(10).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(low, vec!["a", "c"]);

        let cutoff = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let expiring = repo.expiring_before(cutoff).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].id, "b");
    }

    #[tokio::test]
    async fn test_negative_stock_rejected() {
        let repo = DrugRepository::new(create_in_memory_pool().unwrap());
        let expiry = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(repo.create(&drug("a", -1, expiry)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = DrugRepository::new(create_in_memory_pool().unwrap());
        let mut record = drug("a", 5, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        repo.create(&record).await.unwrap();

        record.inventory_quantity = 40;
        repo.update(&record).await.unwrap();
        assert_eq!(repo.find_by_id("a").await.unwrap().unwrap().inventory_quantity, 40);

        repo.delete("a").await.unwrap();
        assert!(matches!(repo.delete("a").await, Err(RepositoryError::NotFound(_))));
    }
}
