use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a news item or announcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub category: String,
    pub date: NaiveDate,
    pub content: String,
    pub file: String,
    pub created_at: DateTime<Utc>,
}
