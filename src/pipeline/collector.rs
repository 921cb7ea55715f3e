use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::dedup::Deduplicator;
use crate::ai::{EnrichmentEngine, EnrichmentInput};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::FeedFetcher;
use crate::models::{CollectionLog, CollectionStatus, Company, EnrichedArticle, RawItem};
use crate::services::Escalator;

#[derive(Debug, Clone, PartialEq)]
pub enum CompanySelection {
    /// Every active company.
    All,
    Ids(Vec<i64>),
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub run_id: String,
    pub companies_processed: usize,
    pub raw_items_collected: usize,
    pub articles_produced: usize,
    pub logs: Vec<CollectionLog>,
}

/// What one company's run produced so far; survives a timeout.
#[derive(Default)]
struct CompanyProgress {
    items: Vec<RawItem>,
    articles: Vec<EnrichedArticle>,
}

enum Target {
    Found(Company),
    Missing(i64),
}

pub struct CollectionOrchestrator {
    repository: Arc<Repository>,
    fetcher: FeedFetcher,
    dedup: Deduplicator,
    enricher: EnrichmentEngine,
    escalator: Arc<Escalator>,
    company_timeout: Duration,
}

impl CollectionOrchestrator {
    pub fn new(
        repository: Arc<Repository>,
        fetcher: FeedFetcher,
        dedup: Deduplicator,
        enricher: EnrichmentEngine,
        escalator: Arc<Escalator>,
        company_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            fetcher,
            dedup,
            enricher,
            escalator,
            company_timeout,
        }
    }

    /// One collection run. Companies are processed one at a time and a
    /// failing company is logged and escalated without stopping the others.
    /// Raw items, articles and logs are persisted after all companies ran.
    pub async fn run(&self, selection: CompanySelection) -> Result<CollectionSummary> {
        let run_id = Uuid::new_v4().to_string();
        let targets = self.resolve(&selection).await?;
        tracing::info!(run_id = %run_id, companies = targets.len(), "Starting collection run");

        let mut raw_items = Vec::new();
        let mut articles = Vec::new();
        let mut logs = Vec::with_capacity(targets.len());

        for target in targets {
            let started_at = Utc::now();
            let (company_id, company_name, progress, outcome) = match target {
                Target::Found(company) => {
                    let mut progress = CompanyProgress::default();
                    let outcome = match tokio::time::timeout(
                        self.company_timeout,
                        self.collect_company(&company, &mut progress),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(AppError::Collection {
                            company: company.name.clone(),
                            message: format!("timed out after {:?}", self.company_timeout),
                        }),
                    };
                    (company.id, company.name, progress, outcome)
                }
                Target::Missing(id) => {
                    let name = format!("company #{id}");
                    let outcome = Err(AppError::Collection {
                        company: name.clone(),
                        message: "company not found".into(),
                    });
                    (id, name, CompanyProgress::default(), outcome)
                }
            };

            let mut log = CollectionLog {
                run_id: run_id.clone(),
                company_id,
                company_name: company_name.clone(),
                status: CollectionStatus::Success,
                items_fetched: progress.items.len(),
                articles_produced: progress.articles.len(),
                error_code: None,
                error_message: None,
                started_at,
                finished_at: Utc::now(),
            };

            match outcome {
                Ok(()) => {
                    tracing::info!(
                        company = %company_name,
                        items = log.items_fetched,
                        articles = log.articles_produced,
                        "Company collected"
                    );
                }
                Err(e) => {
                    let error = match e {
                        e @ AppError::Collection { .. } => e,
                        other => AppError::Collection {
                            company: company_name.clone(),
                            message: other.to_string(),
                        },
                    };
                    tracing::error!(company = %company_name, error = %error, "Company collection failed");
                    log.status = CollectionStatus::Failed;
                    log.error_code = Some(error.code().to_string());
                    log.error_message = Some(error.to_string());
                    self.escalator
                        .escalate(&format!("collection:{company_name}"), &error.to_string())
                        .await;
                }
            }

            raw_items.extend(progress.items);
            articles.extend(progress.articles);
            logs.push(log);
        }

        let raw_items_collected = raw_items.len();
        let articles_produced = articles.len();

        // Each write is attempted on its own so logs survive a failed batch.
        if let Err(e) = self.repository.save_raw_items(&run_id, raw_items).await {
            self.persistence_failed(&run_id, "raw items", &e).await;
        }
        if let Err(e) = self.repository.upsert_enriched_articles(articles).await {
            self.persistence_failed(&run_id, "articles", &e).await;
        }
        for log in &logs {
            if let Err(e) = self.repository.append_collection_log(log.clone()).await {
                self.persistence_failed(&run_id, "collection log", &e).await;
            }
        }

        tracing::info!(
            run_id = %run_id,
            raw_items = raw_items_collected,
            articles = articles_produced,
            failed = logs.iter().filter(|l| l.status == CollectionStatus::Failed).count(),
            "Collection run finished"
        );

        Ok(CollectionSummary {
            run_id,
            companies_processed: logs.len(),
            raw_items_collected,
            articles_produced,
            logs,
        })
    }

    async fn persistence_failed(&self, run_id: &str, what: &str, error: &AppError) {
        tracing::error!(run_id, what, error = %error, "Failed to persist collection results");
        self.escalator
            .escalate(&format!("collection:persist {what}"), &error.to_string())
            .await;
    }

    async fn resolve(&self, selection: &CompanySelection) -> Result<Vec<Target>> {
        match selection {
            CompanySelection::All => Ok(self
                .repository
                .list_active_companies()
                .await?
                .into_iter()
                .map(Target::Found)
                .collect()),
            CompanySelection::Ids(ids) => {
                let mut targets = Vec::with_capacity(ids.len());
                for &id in ids {
                    match self.repository.get_company(id).await? {
                        Some(company) => targets.push(Target::Found(company)),
                        None => targets.push(Target::Missing(id)),
                    }
                }
                Ok(targets)
            }
        }
    }

    /// fetch → dedup → enrich for one company, recording into `progress` as
    /// each stage completes.
    async fn collect_company(&self, company: &Company, progress: &mut CompanyProgress) -> Result<()> {
        self.fetcher.fetch_company(company, &mut progress.items).await;
        let fetched = progress.items.clone();

        if fetched.is_empty() {
            return Ok(());
        }

        let candidates = self.dedup.collapse(fetched).await;
        tracing::debug!(
            company = %company.name,
            items = progress.items.len(),
            candidates = candidates.len(),
            "Deduplicated"
        );

        let inputs = candidates
            .iter()
            .map(|c| EnrichmentInput {
                title: c.representative.title.clone(),
                link: c.representative.link.clone(),
                snippet: c.representative.snippet.clone(),
                company_name: company.name.clone(),
                published_at: c.representative.published_at,
                context: company.context.clone(),
            })
            .collect();
        let summaries = self.enricher.enrich_all(inputs).await;

        let fetched_at = Utc::now();
        progress.articles = candidates
            .into_iter()
            .zip(summaries)
            .map(|(candidate, summary)| {
                EnrichedArticle::from_parts(
                    &candidate.representative,
                    candidate.source_links,
                    summary,
                    fetched_at,
                )
            })
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleQuery, EscalationSettings, FeedSource, NewCompany, SourceKind};
    use crate::testing::{RecordingChat, ScriptedModel};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DUPLICATE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Tech Wire</title>
<item><title>Company X launches new app</title><link>https://wire.example.com/1</link>
<description>Company X launched an app.</description></item>
<item><title>Company X launches new application</title><link>https://wire.example.com/2</link>
<description>Company X launched a new mobile application for small merchants today.</description></item>
<item><title>Company X hires a new CFO</title><link>https://wire.example.com/3</link>
<description>Finance chief appointed.</description></item>
<item><title>Company X launches new app</title><link>https://wire.example.com/1</link>
<description>Syndicated copy.</description></item>
</channel></rss>"#;

    struct Harness {
        repo: Arc<Repository>,
        chat: Arc<RecordingChat>,
        orchestrator: CollectionOrchestrator,
    }

    async fn harness(model: ScriptedModel, company_timeout: Duration) -> Harness {
        let repo = Arc::new(Repository::in_memory().await.unwrap());
        repo.save_escalation_settings(EscalationSettings {
            mention_handle: "<@U1>".into(),
            fallback_channel: "C-ops".into(),
        })
        .await
        .unwrap();
        let chat = Arc::new(RecordingChat::new());
        let model: Arc<ScriptedModel> = Arc::new(model);
        let orchestrator = CollectionOrchestrator::new(
            repo.clone(),
            FeedFetcher::new(reqwest::Client::new(), Duration::ZERO),
            Deduplicator::new(model.clone(), 0.8),
            EnrichmentEngine::new(model, 5, Duration::from_secs(5), "English".into()),
            Arc::new(Escalator::new(chat.clone(), repo.clone())),
            company_timeout,
        );
        Harness {
            repo,
            chat,
            orchestrator,
        }
    }

    async fn add_company(repo: &Repository, name: &str, feeds: Vec<FeedSource>) -> i64 {
        repo.insert_company(NewCompany {
            name: name.into(),
            feeds,
            priority: 1,
            is_active: true,
            context: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn company_without_feeds_succeeds_with_nothing_fetched() {
        let h = harness(ScriptedModel::failing(), Duration::from_secs(5)).await;
        add_company(&h.repo, "Quiet Corp", Vec::new()).await;

        let summary = h.orchestrator.run(CompanySelection::All).await.unwrap();

        assert_eq!(summary.companies_processed, 1);
        assert_eq!(summary.raw_items_collected, 0);
        assert_eq!(summary.logs[0].status, CollectionStatus::Success);
        assert_eq!(summary.logs[0].items_fetched, 0);
        assert_eq!(h.repo.list_collection_logs(10).await.unwrap().len(), 1);
        assert_eq!(h.chat.attempts(), 0);
    }

    #[tokio::test]
    async fn duplicates_merge_with_provenance_and_failed_enrichment_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DUPLICATE_FEED))
            .mount(&server)
            .await;

        // Similarity for (1,2) and (1,3); every enrichment call then fails.
        let h = harness(
            ScriptedModel::new(vec![Some("0.93"), Some("0.1")]),
            Duration::from_secs(5),
        )
        .await;
        let acme = add_company(
            &h.repo,
            "Company X",
            vec![FeedSource::new(SourceKind::Rss, format!("{}/rss", server.uri()))],
        )
        .await;

        let summary = h.orchestrator.run(CompanySelection::Ids(vec![acme])).await.unwrap();

        assert_eq!(summary.raw_items_collected, 3);
        assert_eq!(summary.articles_produced, 2);
        assert_eq!(summary.logs[0].status, CollectionStatus::Success);
        assert_eq!(h.repo.count_raw_items(&summary.run_id).await.unwrap(), 3);

        let stored = h.repo.list_enriched_articles(ArticleQuery::default()).await.unwrap();
        assert_eq!(stored.len(), 2);
        let merged = stored
            .iter()
            .find(|a| a.source_links.len() == 2)
            .expect("merged article");
        assert_eq!(merged.source_links[0].url, "https://wire.example.com/2");
        assert_eq!(merged.source_links[1].url, "https://wire.example.com/1");
        assert_eq!(merged.importance, 50);
        assert_eq!(merged.model_version, "fallback");
    }

    #[tokio::test]
    async fn failing_company_is_escalated_and_others_still_run() {
        let h = harness(ScriptedModel::failing(), Duration::from_secs(5)).await;
        let quiet = add_company(&h.repo, "Quiet Corp", Vec::new()).await;

        let summary = h
            .orchestrator
            .run(CompanySelection::Ids(vec![404, quiet]))
            .await
            .unwrap();

        assert_eq!(summary.companies_processed, 2);
        assert_eq!(summary.logs[0].status, CollectionStatus::Failed);
        assert_eq!(summary.logs[0].error_code.as_deref(), Some("collection"));
        assert_eq!(summary.logs[1].status, CollectionStatus::Success);

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("[collection:company #404]"));
    }

    #[tokio::test]
    async fn slow_company_times_out_as_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(DUPLICATE_FEED)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let h = harness(ScriptedModel::failing(), Duration::from_millis(50)).await;
        add_company(
            &h.repo,
            "Slow Inc",
            vec![FeedSource::new(SourceKind::Rss, format!("{}/rss", server.uri()))],
        )
        .await;

        let summary = h.orchestrator.run(CompanySelection::All).await.unwrap();

        let log = &summary.logs[0];
        assert_eq!(log.status, CollectionStatus::Failed);
        assert!(log.error_message.as_deref().unwrap_or_default().contains("timed out"));
        assert!(log.finished_at >= log.started_at);
        assert_eq!(summary.articles_produced, 0);
    }

    #[tokio::test]
    async fn timeout_keeps_items_from_feeds_already_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DUPLICATE_FEED))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(DUPLICATE_FEED)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let h = harness(ScriptedModel::failing(), Duration::from_millis(500)).await;
        add_company(
            &h.repo,
            "Half Fast",
            vec![
                FeedSource::new(SourceKind::Rss, format!("{}/fast", server.uri())),
                FeedSource::new(SourceKind::Rss, format!("{}/slow", server.uri())),
            ],
        )
        .await;

        let summary = h.orchestrator.run(CompanySelection::All).await.unwrap();

        let log = &summary.logs[0];
        assert_eq!(log.status, CollectionStatus::Failed);
        assert_eq!(log.items_fetched, 3);
        assert_eq!(summary.raw_items_collected, 3);
        assert_eq!(h.repo.count_raw_items(&summary.run_id).await.unwrap(), 3);
        assert_eq!(h.repo.list_collection_logs(10).await.unwrap()[0].items_fetched, 3);
    }

    #[tokio::test]
    async fn failed_batch_write_still_records_logs_and_escalates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(DUPLICATE_FEED)
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let h = harness(ScriptedModel::failing(), Duration::from_secs(5)).await;
        let doomed = add_company(
            &h.repo,
            "Doomed Co",
            vec![FeedSource::new(SourceKind::Rss, format!("{}/rss", server.uri()))],
        )
        .await;

        // The company disappears while its feed is still loading, so the
        // raw item and article writes violate their foreign keys.
        let (summary, deleted) = tokio::join!(h.orchestrator.run(CompanySelection::All), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.repo.delete_company(doomed).await
        });
        assert!(deleted.unwrap());

        let summary = summary.unwrap();
        assert_eq!(summary.logs[0].status, CollectionStatus::Success);
        assert_eq!(summary.raw_items_collected, 3);
        assert_eq!(h.repo.count_raw_items(&summary.run_id).await.unwrap(), 0);
        assert_eq!(h.repo.list_collection_logs(10).await.unwrap().len(), 1);

        let sent = h.chat.sent();
        assert!(sent.iter().any(|m| m.text.contains("[collection:persist raw items]")));
        assert!(sent.iter().any(|m| m.text.contains("[collection:persist articles]")));
    }
}
