use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fetched story before deduplication and enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub company_id: i64,
    pub title: String,
    /// Identity key of the story within a company and run.
    pub link: String,
    pub snippet: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
}
