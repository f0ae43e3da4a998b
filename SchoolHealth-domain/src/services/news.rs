use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::NewsRecord;
use school_health_data::repository::NewsRepositoryTrait;

use crate::entities::conversions;
use crate::entities::news::{News, NewsRequest};
use crate::errors::ServiceError;

/// News items; announcements are the same list shown to every user
pub struct NewsService {
    repository: Arc<dyn NewsRepositoryTrait + Send + Sync>,
}

impl NewsService {
    pub fn new(repository: Arc<dyn NewsRepositoryTrait + Send + Sync>) -> Self {
        Self { repository }
    }

    pub async fn add_news(&self, request: NewsRequest) -> Result<News, ServiceError> {
        request.validate()?;

        let record = NewsRecord {
            id: Uuid::new_v4().to_string(),
            title: request.title.trim().to_string(),
            category: request.category.trim().to_string(),
            date: request.date,
            content: request.content,
            file: request.file,
            created_at: Utc::now(),
        };

        self.repository.create(&record).await?;
        info!("Published news {}", record.id);
        Ok(conversions::convert_to_domain_news(record))
    }

    /// Newest date first
    pub async fn list_news(&self) -> Result<Vec<News>, ServiceError> {
        Ok(self
            .repository
            .list()
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_news)
            .collect())
    }

    pub async fn update_news(&self, id: &str, request: NewsRequest) -> Result<News, ServiceError> {
        request.validate()?;
        let mut record = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("News {} not found", id)))?;

        record.title = request.title.trim().to_string();
        record.category = request.category.trim().to_string();
        record.date = request.date;
        record.content = request.content;
        record.file = request.file;

        self.repository.update(&record).await?;
        Ok(conversions::convert_to_domain_news(record))
    }

    pub async fn delete_news(&self, id: &str) -> Result<(), ServiceError> {
        self.repository.delete(id).await?;
        info!("Deleted news {}", id);
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        Ok(self.repository.count().await?)
    }
}
