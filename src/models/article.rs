use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ArticleSummary, Category, RawItem};

/// Provenance entry; one per merged duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub url: String,
    pub title: String,
    pub source: String,
}

impl From<&RawItem> for SourceLink {
    fn from(item: &RawItem) -> Self {
        Self {
            url: item.link.clone(),
            title: item.title.clone(),
            source: item.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub id: Uuid,
    pub company_id: i64,
    pub original_title: String,
    pub translated_title: String,
    pub summary: String,
    pub headline: String,
    pub importance: u8,
    pub categories: Vec<Category>,
    pub published_at: DateTime<Utc>,
    pub source_links: Vec<SourceLink>,
    pub model_version: String,
}

impl EnrichedArticle {
    /// Stable id for a representative item, so re-runs upsert the same row.
    pub fn stable_id(company_id: i64, link: &str) -> Uuid {
        Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("{company_id}:{link}").as_bytes(),
        )
    }

    pub fn from_parts(
        representative: &RawItem,
        source_links: Vec<SourceLink>,
        summary: ArticleSummary,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::stable_id(representative.company_id, &representative.link),
            company_id: representative.company_id,
            original_title: representative.title.clone(),
            translated_title: summary.translated_title,
            summary: summary.summary,
            headline: summary.headline,
            importance: summary.importance,
            categories: summary.categories,
            published_at: representative.published_at.unwrap_or(fetched_at),
            source_links,
            model_version: summary.model_version,
        }
    }

    /// Link shown in reports: the representative's own link.
    pub fn primary_link(&self) -> &str {
        self.source_links
            .first()
            .map(|l| l.url.as_str())
            .unwrap_or_default()
    }
}

/// Filter for reading articles back out of storage.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub company_ids: Option<Vec<i64>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ArticleQuery {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            company_ids: None,
            from: Some(from),
            to: Some(to),
        }
    }
}
