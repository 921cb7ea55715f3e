use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use super::client::{parse_json_reply, truncate_chars, CompletionRequest, LanguageModel};
use crate::error::{AppError, Result};
use crate::models::{ArticleSummary, Category};

const SUMMARY_MAX_CHARS: usize = 200;
const HEADLINE_MAX_CHARS: usize = 50;
const MAX_CATEGORIES: usize = 3;
const SNIPPET_PROMPT_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = r#"You are an analyst tracking competitor companies for a strategy team.
For the news item you are given, respond with ONLY a JSON object of this shape:
{
  "translated_title": "<title translated into {language}>",
  "summary": "<summary in {language}, at most 200 characters>",
  "headline": "<one-line headline in {language}, at most 50 characters>",
  "importance": <integer 0-100>,
  "categories": ["<one to three of: strategy, technology, personnel, finance, partnership, regulatory, other>"]
}

Importance guidance:
- 90 and above: changes the industry
- 80-89: strategically significant for the company
- 70-79: useful competitive intelligence
- 60-69: minor news
- 50 and below: negligible"#;

/// One representative item to be enriched.
#[derive(Debug, Clone)]
pub struct EnrichmentInput {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub company_name: String,
    pub published_at: Option<DateTime<Utc>>,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrichmentReply {
    translated_title: String,
    summary: String,
    headline: String,
    importance: f64,
    #[serde(default)]
    categories: Vec<String>,
}

pub struct EnrichmentEngine {
    model: Arc<dyn LanguageModel>,
    concurrency: usize,
    timeout: Duration,
    target_language: String,
}

impl EnrichmentEngine {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        concurrency: usize,
        timeout: Duration,
        target_language: String,
    ) -> Self {
        Self {
            model,
            concurrency: concurrency.max(1),
            timeout,
            target_language,
        }
    }

    /// Enrich every input, at most `concurrency` calls in flight. Output order
    /// matches input order and every failure is replaced by the fallback.
    pub async fn enrich_all(&self, inputs: Vec<EnrichmentInput>) -> Vec<ArticleSummary> {
        stream::iter(inputs)
            .map(|input| async move { self.enrich(&input).await })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    pub async fn enrich(&self, input: &EnrichmentInput) -> ArticleSummary {
        match tokio::time::timeout(self.timeout, self.try_enrich(input)).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                tracing::warn!(link = %input.link, error = %e, "Enrichment failed, using fallback");
                ArticleSummary::fallback(&input.title, &input.company_name)
            }
            Err(_) => {
                tracing::warn!(link = %input.link, timeout = ?self.timeout, "Enrichment timed out, using fallback");
                ArticleSummary::fallback(&input.title, &input.company_name)
            }
        }
    }

    async fn try_enrich(&self, input: &EnrichmentInput) -> Result<ArticleSummary> {
        let system = SYSTEM_PROMPT.replace("{language}", &self.target_language);
        let request = CompletionRequest::new(system, self.user_prompt(input))
            .temperature(0.2)
            .max_tokens(600);

        let reply = self.model.complete(&request).await?;
        let parsed: EnrichmentReply = parse_json_reply(&reply)
            .map_err(|e| AppError::Enrichment(format!("malformed reply: {e}")))?;

        Ok(self.normalize(parsed))
    }

    fn user_prompt(&self, input: &EnrichmentInput) -> String {
        let mut prompt = format!(
            "Company: {}\nTitle: {}\nLink: {}\n",
            input.company_name, input.title, input.link
        );
        if let Some(published) = input.published_at {
            prompt.push_str(&format!("Published: {}\n", published.format("%Y-%m-%d %H:%M UTC")));
        }
        if let Some(context) = input.context.as_deref().filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("Context: {context}\n"));
        }
        prompt.push_str(&format!(
            "\nContent:\n{}",
            truncate_chars(&input.snippet, SNIPPET_PROMPT_CHARS)
        ));
        prompt
    }

    fn normalize(&self, reply: EnrichmentReply) -> ArticleSummary {
        let mut categories: Vec<Category> = Vec::new();
        for raw in &reply.categories {
            match raw.parse::<Category>() {
                Ok(c) if !categories.contains(&c) => categories.push(c),
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Dropping category outside vocabulary"),
            }
        }
        categories.truncate(MAX_CATEGORIES);
        if categories.is_empty() {
            categories.push(Category::Other);
        }

        let importance = if reply.importance.is_finite() {
            reply.importance.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        ArticleSummary {
            translated_title: reply.translated_title.trim().to_string(),
            summary: truncate_chars(reply.summary.trim(), SUMMARY_MAX_CHARS),
            headline: truncate_chars(reply.headline.trim(), HEADLINE_MAX_CHARS),
            importance,
            categories,
            model_version: self.model.model_name().to_string(),
        }
    }
}
