use async_trait::async_trait;
use rusqlite::{params, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::{expect_affected, optional};
use crate::database::DatabasePool;
use crate::models::{AccountFilter, AccountRecord};

/// Repository trait for student and user accounts
#[async_trait]
pub trait AccountRepositoryTrait {
    /// Insert a new account
    async fn create(&self, account: &AccountRecord) -> Result<(), RepositoryError>;

    /// Insert several accounts in one transaction
    async fn create_many(&self, accounts: &[AccountRecord]) -> Result<usize, RepositoryError>;

    /// Find an account by its id
    async fn find_by_id(&self, id: &str) -> Result<Option<AccountRecord>, RepositoryError>;

    /// Find an account by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, RepositoryError>;

    /// Find a student by school student id
    async fn find_by_student_id(&self, student_id: &str) -> Result<Option<AccountRecord>, RepositoryError>;

    /// List accounts ordered by name
    async fn list(&self, filter: &AccountFilter) -> Result<Vec<AccountRecord>, RepositoryError>;

    /// Overwrite the profile columns of an account
    async fn update(&self, account: &AccountRecord) -> Result<(), RepositoryError>;

    /// Replace the password hash
    async fn update_password(&self, id: &str, password_hash: &str) -> Result<(), RepositoryError>;

    /// Delete an account
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// Count accounts with a role
    async fn count_by_role(&self, role: &str) -> Result<i64, RepositoryError>;
}

/// SQLite-backed account repository
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: DatabasePool,
}

impl AccountRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, email, password_hash, image, address_line1, address_line2,
    gender, dob, phone, role, cohort, student_id, major, about, created_at, updated_at
    FROM accounts";

fn map_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        address_line1: row.get(5)?,
        address_line2: row.get(6)?,
        gender: row.get(7)?,
        dob: row.get(8)?,
        phone: row.get(9)?,
        role: row.get(10)?,
        cohort: row.get(11)?,
        student_id: row.get(12)?,
        major: row.get(13)?,
        about: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn insert(conn: &rusqlite::Connection, a: &AccountRecord) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO accounts (id, name, email, password_hash, image, address_line1, address_line2,
            gender, dob, phone, role, cohort, student_id, major, about, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            a.id, a.name, a.email, a.password_hash, a.image, a.address_line1, a.address_line2,
            a.gender, a.dob, a.phone, a.role, a.cohort, a.student_id, a.major, a.about,
            a.created_at, a.updated_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl AccountRepositoryTrait for AccountRepository {
    async fn create(&self, account: &AccountRecord) -> Result<(), RepositoryError> {
        debug!("Storing account: id={}", account.id);
        let conn = self.pool.conn()?;
        insert(&conn, account)
    }

    async fn create_many(&self, accounts: &[AccountRecord]) -> Result<usize, RepositoryError> {
        let mut conn = self.pool.conn()?;
        let tx = conn.transaction()?;
        for account in accounts {
            insert(&tx, account)?;
        }
        tx.commit()?;
        debug!("Stored {} accounts", accounts.len());
        Ok(accounts.len())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AccountRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), [id], map_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE email = ?1", SELECT_COLUMNS), [email], map_row))
    }

    async fn find_by_student_id(&self, student_id: &str) -> Result<Option<AccountRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(
            &format!("{} WHERE student_id = ?1", SELECT_COLUMNS),
            [student_id],
            map_row,
        ))
    }

    async fn list(&self, filter: &AccountFilter) -> Result<Vec<AccountRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR role = ?1)
               AND (?2 IS NULL OR cohort = ?2)
               AND (?3 IS NULL OR major = ?3)
             ORDER BY name COLLATE NOCASE",
            SELECT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![filter.role, filter.cohort, filter.major], map_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    async fn update(&self, a: &AccountRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE accounts SET name = ?2, image = ?3, address_line1 = ?4, address_line2 = ?5,
                gender = ?6, dob = ?7, phone = ?8, cohort = ?9, major = ?10, about = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                a.id, a.name, a.image, a.address_line1, a.address_line2, a.gender, a.dob, a.phone,
                a.cohort, a.major, a.about, a.updated_at,
            ],
        )?;
        expect_affected(affected, "account", &a.id)
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE accounts SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, password_hash, chrono::Utc::now()],
        )?;
        expect_affected(affected, "account", id)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
        expect_affected(affected, "account", id)
    }

    async fn count_by_role(&self, role: &str) -> Result<i64, RepositoryError> {
        let conn = self.pool.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM accounts WHERE role = ?1", [role], |row| row.get(0))?)
    }
}
