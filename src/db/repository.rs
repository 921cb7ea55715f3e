use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ArticleQuery, ChannelSettings, CollectionLog, Company, DeliveryLog, EnrichedArticle,
    EscalationSettings, NewCompany, RawItem,
};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Company operations

    pub async fn insert_company(&self, company: NewCompany) -> Result<i64> {
        let feeds = serde_json::to_string(&company.feeds)?;
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO companies (name, feeds, priority, is_active, context) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![company.name, feeds, company.priority, company.is_active, company.context],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_active_companies(&self) -> Result<Vec<Company>> {
        self.query_companies("WHERE is_active = 1").await
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        self.query_companies("").await
    }

    pub async fn get_company(&self, id: i64) -> Result<Option<Company>> {
        let company = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, feeds, priority, is_active, context FROM companies WHERE id = ?1",
                )?;
                let company = stmt.query_row(params![id], company_from_row).optional()?;
                Ok(company)
            })
            .await?;
        Ok(company)
    }

    /// Remove a company; its raw items and articles go with it.
    pub async fn delete_company(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM companies WHERE id = ?1", params![id])?))
            .await?;
        Ok(deleted > 0)
    }

    async fn query_companies(&self, filter: &'static str) -> Result<Vec<Company>> {
        let companies = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT id, name, feeds, priority, is_active, context FROM companies {filter} ORDER BY priority DESC, name"
                );
                let mut stmt = conn.prepare(&sql)?;
                let companies = stmt
                    .query_map([], company_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(companies)
            })
            .await?;
        Ok(companies)
    }

    // Raw item operations

    pub async fn save_raw_items(&self, run_id: &str, items: Vec<RawItem>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let run_id = run_id.to_string();
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT OR IGNORE INTO raw_items (run_id, company_id, title, link, snippet, source, published_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    )?;
                    for item in &items {
                        inserted += stmt.execute(params![
                            run_id,
                            item.company_id,
                            item.title,
                            item.link,
                            item.snippet,
                            item.source,
                            item.published_at.map(format_timestamp),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn count_raw_items(&self, run_id: &str) -> Result<usize> {
        let run_id = run_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM raw_items WHERE run_id = ?1",
                    params![run_id],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await?;
        Ok(count)
    }

    // Enriched article operations

    /// Insert or refresh articles by id. The first stored `published_at` is
    /// kept, so an undated item stays on the day it was first seen.
    pub async fn upsert_enriched_articles(&self, articles: Vec<EnrichedArticle>) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }
        let mut rows = Vec::with_capacity(articles.len());
        for a in articles {
            let categories = serde_json::to_string(&a.categories)?;
            let links = serde_json::to_string(&a.source_links)?;
            rows.push((categories, links, a));
        }

        let written = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO enriched_articles (id, company_id, original_title, translated_title, summary,
                                                          headline, importance, categories, published_at, source_links, model_version)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                           ON CONFLICT(id) DO UPDATE SET
                               original_title = excluded.original_title,
                               translated_title = excluded.translated_title,
                               summary = excluded.summary,
                               headline = excluded.headline,
                               importance = excluded.importance,
                               categories = excluded.categories,
                               source_links = excluded.source_links,
                               model_version = excluded.model_version,
                               updated_at = datetime('now')"#,
                    )?;
                    for (categories, links, a) in &rows {
                        stmt.execute(params![
                            a.id.to_string(),
                            a.company_id,
                            a.original_title,
                            a.translated_title,
                            a.summary,
                            a.headline,
                            a.importance,
                            categories,
                            format_timestamp(a.published_at),
                            links,
                            a.model_version,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(written)
    }

    /// Articles matching the query, newest first.
    pub async fn list_enriched_articles(&self, query: ArticleQuery) -> Result<Vec<EnrichedArticle>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(from) = query.from {
            clauses.push("published_at >= ?".to_string());
            values.push(Value::Text(format_timestamp(from)));
        }
        if let Some(to) = query.to {
            clauses.push("published_at <= ?".to_string());
            values.push(Value::Text(format_timestamp(to)));
        }
        if let Some(ids) = query.company_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!("company_id IN ({placeholders})"));
            values.extend(ids.into_iter().map(Value::Integer));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    r#"SELECT id, company_id, original_title, translated_title, summary, headline,
                              importance, categories, published_at, source_links, model_version
                       FROM enriched_articles {where_clause}
                       ORDER BY published_at DESC"#
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params_from_iter(values), article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    // Log operations

    pub async fn append_collection_log(&self, log: CollectionLog) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO collection_logs (run_id, company_id, company_name, status, items_fetched,
                                                    articles_produced, error_code, error_message, started_at, finished_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                    params![
                        log.run_id,
                        log.company_id,
                        log.company_name,
                        log.status.as_str(),
                        log.items_fetched as i64,
                        log.articles_produced as i64,
                        log.error_code,
                        log.error_message,
                        format_timestamp(log.started_at),
                        format_timestamp(log.finished_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn list_collection_logs(&self, limit: usize) -> Result<Vec<CollectionLog>> {
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT run_id, company_id, company_name, status, items_fetched, articles_produced,
                              error_code, error_message, started_at, finished_at
                       FROM collection_logs ORDER BY id DESC LIMIT ?1"#,
                )?;
                let logs = stmt
                    .query_map(params![limit as i64], collection_log_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }

    pub async fn append_delivery_log(&self, log: DeliveryLog) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO delivery_logs (report_kind, channel, thread_count, article_count, status,
                                                  error_code, error_message, started_at, finished_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                    params![
                        log.report_kind.as_str(),
                        log.channel,
                        log.thread_count as i64,
                        log.article_count as i64,
                        log.status.as_str(),
                        log.error_code,
                        log.error_message,
                        format_timestamp(log.started_at),
                        format_timestamp(log.finished_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn list_delivery_logs(&self, limit: usize) -> Result<Vec<DeliveryLog>> {
        let logs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT report_kind, channel, thread_count, article_count, status,
                              error_code, error_message, started_at, finished_at
                       FROM delivery_logs ORDER BY id DESC LIMIT ?1"#,
                )?;
                let logs = stmt
                    .query_map(params![limit as i64], delivery_log_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }

    // Settings

    pub async fn get_channel_settings(&self) -> Result<Option<ChannelSettings>> {
        let settings = self
            .conn
            .call(|conn| {
                let settings = conn
                    .query_row(
                        "SELECT channel_id, channel_name, thread_strategy, mention_user_id, updated_by FROM channel_settings WHERE id = 1",
                        [],
                        |row| {
                            Ok(ChannelSettings {
                                channel_id: row.get(0)?,
                                channel_name: row.get(1)?,
                                thread_strategy: parse_column(row, 2)?,
                                mention_user_id: row.get(3)?,
                                updated_by: row.get(4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(settings)
            })
            .await?;
        Ok(settings)
    }

    pub async fn save_channel_settings(&self, settings: ChannelSettings) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO channel_settings (id, channel_id, channel_name, thread_strategy, mention_user_id, updated_by)
                       VALUES (1, ?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(id) DO UPDATE SET
                           channel_id = excluded.channel_id,
                           channel_name = excluded.channel_name,
                           thread_strategy = excluded.thread_strategy,
                           mention_user_id = excluded.mention_user_id,
                           updated_by = excluded.updated_by,
                           updated_at = datetime('now')"#,
                    params![
                        settings.channel_id,
                        settings.channel_name,
                        settings.thread_strategy.as_str(),
                        settings.mention_user_id,
                        settings.updated_by,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_escalation_settings(&self) -> Result<Option<EscalationSettings>> {
        let settings = self
            .conn
            .call(|conn| {
                let settings = conn
                    .query_row(
                        "SELECT mention_handle, fallback_channel FROM escalation_settings WHERE id = 1",
                        [],
                        |row| {
                            Ok(EscalationSettings {
                                mention_handle: row.get(0)?,
                                fallback_channel: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(settings)
            })
            .await?;
        Ok(settings)
    }

    pub async fn save_escalation_settings(&self, settings: EscalationSettings) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO escalation_settings (id, mention_handle, fallback_channel)
                       VALUES (1, ?1, ?2)
                       ON CONFLICT(id) DO UPDATE SET
                           mention_handle = excluded.mention_handle,
                           fallback_channel = excluded.fallback_channel,
                           updated_at = datetime('now')"#,
                    params![settings.mention_handle, settings.fallback_channel],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
impl Repository {
    /// Run arbitrary SQL, for tests that need to break the store.
    pub async fn run_sql(&self, sql: &'static str) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Fixed-width UTC timestamps so that text comparison orders correctly.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn company_from_row(row: &Row) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        feeds: parse_json(row, 2)?,
        priority: row.get(3)?,
        is_active: row.get(4)?,
        context: row.get(5)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<EnrichedArticle> {
    let id: String = row.get(0)?;
    Ok(EnrichedArticle {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        company_id: row.get(1)?,
        original_title: row.get(2)?,
        translated_title: row.get(3)?,
        summary: row.get(4)?,
        headline: row.get(5)?,
        importance: row.get(6)?,
        categories: parse_json(row, 7)?,
        published_at: parse_timestamp(row, 8)?,
        source_links: parse_json(row, 9)?,
        model_version: row.get(10)?,
    })
}

fn collection_log_from_row(row: &Row) -> rusqlite::Result<CollectionLog> {
    Ok(CollectionLog {
        run_id: row.get(0)?,
        company_id: row.get(1)?,
        company_name: row.get(2)?,
        status: parse_column(row, 3)?,
        items_fetched: row.get::<_, i64>(4)? as usize,
        articles_produced: row.get::<_, i64>(5)? as usize,
        error_code: row.get(6)?,
        error_message: row.get(7)?,
        started_at: parse_timestamp(row, 8)?,
        finished_at: parse_timestamp(row, 9)?,
    })
}

fn delivery_log_from_row(row: &Row) -> rusqlite::Result<DeliveryLog> {
    Ok(DeliveryLog {
        report_kind: parse_column(row, 0)?,
        channel: row.get(1)?,
        thread_count: row.get::<_, i64>(2)? as usize,
        article_count: row.get::<_, i64>(3)? as usize,
        status: parse_column(row, 4)?,
        error_code: row.get(5)?,
        error_message: row.get(6)?,
        started_at: parse_timestamp(row, 7)?,
        finished_at: parse_timestamp(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CollectionStatus, DeliveryStatus, ReportKind, SourceKind, ThreadStrategy,
    };
    use crate::testing::{article, seeded_company};
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn active_companies_exclude_inactive_rows() {
        let repo = Repository::in_memory().await.unwrap();
        seeded_company(&repo, "Acme").await;
        repo.insert_company(NewCompany {
            name: "Dormant".into(),
            feeds: vec![],
            priority: 0,
            is_active: false,
            context: Some("legacy".into()),
        })
        .await
        .unwrap();

        let active = repo.list_active_companies().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Acme");
        assert_eq!(active[0].feeds[0].kind, SourceKind::Rss);
        assert_eq!(repo.list_companies().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upserted_article_round_trips() {
        let repo = Repository::in_memory().await.unwrap();
        let company_id = seeded_company(&repo, "Acme").await;
        let published = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let original = article(company_id, "https://example.com/a", 82, published);

        repo.upsert_enriched_articles(vec![original.clone()]).await.unwrap();
        let listed = repo.list_enriched_articles(ArticleQuery::default()).await.unwrap();

        assert_eq!(listed, vec![original]);
    }

    #[tokio::test]
    async fn reprocessing_same_item_updates_instead_of_inserting() {
        let repo = Repository::in_memory().await.unwrap();
        let company_id = seeded_company(&repo, "Acme").await;
        let published = Utc::now();
        let first = article(company_id, "https://example.com/a", 60, published);
        let mut second = first.clone();
        second.importance = 91;

        repo.upsert_enriched_articles(vec![first]).await.unwrap();
        repo.upsert_enriched_articles(vec![second]).await.unwrap();

        let listed = repo.list_enriched_articles(ArticleQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].importance, 91);
    }

    #[tokio::test]
    async fn rerun_keeps_first_seen_date_of_undated_item() {
        let repo = Repository::in_memory().await.unwrap();
        let company_id = seeded_company(&repo, "Acme").await;
        let mut item = crate::testing::raw_item(company_id, "Undated story", "https://a/undated", "text");
        item.published_at = None;
        let first_fetch = Utc.with_ymd_and_hms(2026, 5, 10, 3, 0, 0).unwrap();
        let next_fetch = first_fetch + Duration::days(1);
        let build = |fetched_at| {
            EnrichedArticle::from_parts(
                &item,
                vec![crate::models::SourceLink::from(&item)],
                crate::models::ArticleSummary::fallback(&item.title, "Acme"),
                fetched_at,
            )
        };

        repo.upsert_enriched_articles(vec![build(first_fetch)]).await.unwrap();
        repo.upsert_enriched_articles(vec![build(next_fetch)]).await.unwrap();

        let day_one = ArticleQuery::between(first_fetch - Duration::hours(1), first_fetch + Duration::hours(1));
        let day_two = ArticleQuery::between(next_fetch - Duration::hours(1), next_fetch + Duration::hours(1));
        assert_eq!(repo.list_enriched_articles(day_one).await.unwrap().len(), 1);
        assert!(repo.list_enriched_articles(day_two).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_company_removes_its_articles() {
        let repo = Repository::in_memory().await.unwrap();
        let company_id = seeded_company(&repo, "Acme").await;
        repo.upsert_enriched_articles(vec![article(company_id, "https://a/1", 70, Utc::now())])
            .await
            .unwrap();

        assert!(repo.delete_company(company_id).await.unwrap());
        assert!(!repo.delete_company(company_id).await.unwrap());
        assert!(repo.get_company(company_id).await.unwrap().is_none());
        assert!(repo.list_enriched_articles(ArticleQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn article_query_filters_by_range_and_company() {
        let repo = Repository::in_memory().await.unwrap();
        let acme = seeded_company(&repo, "Acme").await;
        let globex = seeded_company(&repo, "Globex").await;
        let day = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();

        repo.upsert_enriched_articles(vec![
            article(acme, "https://a/1", 70, day),
            article(acme, "https://a/2", 70, day - Duration::days(3)),
            article(globex, "https://g/1", 70, day),
        ])
        .await
        .unwrap();

        let in_range = repo
            .list_enriched_articles(ArticleQuery::between(day - Duration::hours(1), day + Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(in_range.len(), 2);

        let acme_only = repo
            .list_enriched_articles(ArticleQuery {
                company_ids: Some(vec![acme]),
                ..ArticleQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(acme_only.len(), 2);
        assert!(acme_only.iter().all(|a| a.company_id == acme));
    }

    #[tokio::test]
    async fn raw_items_ignore_repeated_links_within_a_run() {
        let repo = Repository::in_memory().await.unwrap();
        let company_id = seeded_company(&repo, "Acme").await;
        let item = RawItem {
            company_id,
            title: "Launch".into(),
            link: "https://example.com/launch".into(),
            snippet: String::new(),
            source: "Wire".into(),
            published_at: None,
        };

        let inserted = repo
            .save_raw_items("run-1", vec![item.clone(), item.clone()])
            .await
            .unwrap();
        repo.save_raw_items("run-2", vec![item]).await.unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(repo.count_raw_items("run-1").await.unwrap(), 1);
        assert_eq!(repo.count_raw_items("run-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn logs_are_appended_and_listed_newest_first() {
        let repo = Repository::in_memory().await.unwrap();
        let now = Utc::now();
        for name in ["first", "second"] {
            repo.append_collection_log(CollectionLog {
                run_id: "run".into(),
                company_id: 1,
                company_name: name.into(),
                status: CollectionStatus::Failed,
                items_fetched: 3,
                articles_produced: 0,
                error_code: Some("collection".into()),
                error_message: Some("boom".into()),
                started_at: now,
                finished_at: now,
            })
            .await
            .unwrap();
        }
        repo.append_delivery_log(DeliveryLog {
            report_kind: ReportKind::Weekly,
            channel: "C1".into(),
            thread_count: 2,
            article_count: 12,
            status: DeliveryStatus::Success,
            error_code: None,
            error_message: None,
            started_at: now,
            finished_at: now,
        })
        .await
        .unwrap();

        let collection = repo.list_collection_logs(10).await.unwrap();
        assert_eq!(collection[0].company_name, "second");
        assert_eq!(collection[1].status, CollectionStatus::Failed);

        let delivery = repo.list_delivery_logs(10).await.unwrap();
        assert_eq!(delivery.len(), 1);
        assert_eq!(delivery[0].report_kind, ReportKind::Weekly);
        assert_eq!(delivery[0].thread_count, 2);
    }

    #[tokio::test]
    async fn settings_are_single_row_upserts() {
        let repo = Repository::in_memory().await.unwrap();
        assert!(repo.get_channel_settings().await.unwrap().is_none());

        for channel in ["C1", "C2"] {
            repo.save_channel_settings(ChannelSettings {
                channel_id: channel.into(),
                channel_name: Some("#competitors".into()),
                thread_strategy: ThreadStrategy::None,
                mention_user_id: None,
                updated_by: Some("admin".into()),
            })
            .await
            .unwrap();
        }
        repo.save_escalation_settings(EscalationSettings {
            mention_handle: "<@U42>".into(),
            fallback_channel: "C-ops".into(),
        })
        .await
        .unwrap();

        let channel = repo.get_channel_settings().await.unwrap().unwrap();
        assert_eq!(channel.channel_id, "C2");
        assert_eq!(channel.thread_strategy, ThreadStrategy::None);
        let escalation = repo.get_escalation_settings().await.unwrap().unwrap();
        assert_eq!(escalation.fallback_channel, "C-ops");
    }

    #[tokio::test]
    async fn file_backed_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.db");
        let path = path.to_string_lossy().to_string();

        {
            let repo = Repository::new(&path).await.unwrap();
            seeded_company(&repo, "Acme").await;
        }
        let repo = Repository::new(&path).await.unwrap();
        let company = repo.get_company(1).await.unwrap();
        assert_eq!(company.map(|c| c.name), Some("Acme".to_string()));
    }
}
