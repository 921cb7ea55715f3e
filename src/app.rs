use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};

use crate::ai::{ClaudeClient, EnrichmentEngine, LanguageModel, UnconfiguredModel};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::FeedFetcher;
use crate::models::DeliveryLog;
use crate::pipeline::{CollectionOrchestrator, CollectionSummary, CompanySelection, Deduplicator};
use crate::report::ReportAggregator;
use crate::scheduler;
use crate::services::{
    ChatClient, DeliveryEngine, Escalator, ReportMessage, RetryPolicy, SlackClient,
    UnconfiguredChat,
};

/// Wires every pipeline component from the loaded configuration. Clients are
/// built once here and handed down.
pub struct App {
    config: Config,
    timezone: FixedOffset,
    repository: Arc<Repository>,
    chat_configured: bool,
    orchestrator: CollectionOrchestrator,
    aggregator: ReportAggregator,
    delivery: DeliveryEngine,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let timezone = config.timezone()?;
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let http = FeedFetcher::default_client()?;

        let model: Arc<dyn LanguageModel> = match &config.anthropic_api_key {
            Some(key) if !key.is_empty() => Arc::new(ClaudeClient::new(
                key.clone(),
                config.anthropic_model.clone(),
                config.llm_timeout(),
            )?),
            _ => {
                tracing::warn!("No Anthropic API key configured, all model output will use fallbacks");
                Arc::new(UnconfiguredModel)
            }
        };

        let (chat, chat_configured): (Arc<dyn ChatClient>, bool) = match &config.slack_bot_token {
            Some(token) if !token.is_empty() => (
                Arc::new(
                    SlackClient::new(http.clone(), token.clone(), config.messages_per_second)
                        .with_base_url(&config.slack_api_url),
                ),
                true,
            ),
            _ => (Arc::new(UnconfiguredChat), false),
        };

        let escalator = Arc::new(Escalator::new(chat.clone(), repository.clone()));

        let orchestrator = CollectionOrchestrator::new(
            repository.clone(),
            FeedFetcher::new(http, config.search_delay()),
            Deduplicator::new(model.clone(), config.similarity_threshold),
            EnrichmentEngine::new(
                model.clone(),
                config.enrich_concurrency,
                config.enrich_timeout(),
                config.target_language.clone(),
            ),
            escalator.clone(),
            config.company_timeout(),
        );
        let aggregator = ReportAggregator::new(
            repository.clone(),
            model,
            timezone,
            config.target_language.clone(),
        );
        let delivery = DeliveryEngine::new(
            chat,
            repository.clone(),
            escalator,
            RetryPolicy::from_config(&config),
        );

        Ok(Self {
            config,
            timezone,
            repository,
            chat_configured,
            orchestrator,
            aggregator,
            delivery,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Today's date in the operating timezone.
    pub fn today(&self) -> NaiveDate {
        self.aggregator.today()
    }

    pub async fn collect(&self, selection: CompanySelection) -> Result<CollectionSummary> {
        self.orchestrator.run(selection).await
    }

    pub async fn send_daily(&self, day: NaiveDate) -> Result<DeliveryLog> {
        self.require_chat()?;
        let report = self.aggregator.build_daily(day).await?;
        self.send(report).await
    }

    pub async fn send_weekly(&self, date: NaiveDate) -> Result<DeliveryLog> {
        self.require_chat()?;
        let report = self.aggregator.build_weekly(date).await?;
        self.send(report).await
    }

    pub async fn send_digest(&self, day: NaiveDate) -> Result<DeliveryLog> {
        self.require_chat()?;
        let report = self.aggregator.build_ranked_digest(day).await?;
        self.send(report).await
    }

    pub async fn serve(&self) {
        scheduler::run(self).await
    }

    async fn send(&self, report: ReportMessage) -> Result<DeliveryLog> {
        self.delivery.deliver(report).await
    }

    fn require_chat(&self) -> Result<()> {
        if self.chat_configured {
            Ok(())
        } else {
            Err(AppError::Config(
                "slack_bot_token is not set (config file or SLACK_BOT_TOKEN)".into(),
            ))
        }
    }
}
