use async_trait::async_trait;
use rusqlite::{params, Row};

use super::errors::RepositoryError;
use super::support::{expect_affected, optional};
use crate::database::DatabasePool;
use crate::models::NewsRecord;

/// Repository trait for news and announcements
#[async_trait]
pub trait NewsRepositoryTrait {
    async fn create(&self, news: &NewsRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<NewsRecord>, RepositoryError>;
    /// Newest date first
    async fn list(&self) -> Result<Vec<NewsRecord>, RepositoryError>;
    async fn update(&self, news: &NewsRecord) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct NewsRepository {
    pool: DatabasePool,
}

impl NewsRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, title, category, news_date, content, file, created_at FROM news";

fn map_row(row: &Row<'_>) -> rusqlite::Result<NewsRecord> {
    Ok(NewsRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        date: row.get(3)?,
        content: row.get(4)?,
        file: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[async_trait]
impl NewsRepositoryTrait for NewsRepository {
    async fn create(&self, n: &NewsRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO news (id, title, category, news_date, content, file, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![n.id, n.title, n.category, n.date, n.content, n.file, n.created_at],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<NewsRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), [id], map_row))
    }

    async fn list(&self) -> Result<Vec<NewsRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY news_date DESC, created_at DESC", SELECT_COLUMNS))?;
        let news = stmt.query_map([], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(news)
    }

    async fn update(&self, n: &NewsRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE news SET title = ?2, category = ?3, news_date = ?4, content = ?5, file = ?6 WHERE id = ?1",
            params![n.id, n.title, n.category, n.date, n.content, n.file],
        )?;
        expect_affected(affected, "news", &n.id)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute("DELETE FROM news WHERE id = ?1", [id])?;
        expect_affected(affected, "news", id)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use chrono::{NaiveDate, Utc};

    fn news(id: &str, day: u32) -> NewsRecord {
        NewsRecord {
            id: id.to_string(),
            title: format!("Notice {}", id),
            category: "health".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            content: "Vaccination day".to_string(),
            file: "/uploads/notice.pdf".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_and_update() {
        let repo = NewsRepository::new(create_in_memory_pool().unwrap());
        repo.create(&news("n1", 1)).await.unwrap();
        repo.create(&news("n2", 20)).await.unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed[0].id, "n2");

        let mut edited = listed[1].clone();
        edited.title = "Updated".to_string();
        repo.update(&edited).await.unwrap();
        assert_eq!(repo.find_by_id("n1").await.unwrap().unwrap().title, "Updated");
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
