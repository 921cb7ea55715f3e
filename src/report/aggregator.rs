use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use super::format::{self, Names, SPOTLIGHT_LIMIT};
use crate::ai::{parse_json_reply, truncate_chars, CompletionRequest, LanguageModel};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{ArticleQuery, ChannelSettings, EnrichedArticle, ReportKind, ThreadStrategy};
use crate::services::ReportMessage;

const NO_ARTICLES_TODAY: &str = "No competitor articles today.";
const SEE_ARTICLES_TODAY: &str = "See the articles below for today's competitor developments.";
const NO_ARTICLES_THIS_WEEK: &str = "No competitor articles this week.";
const WEEKLY_SUMMARY_UNAVAILABLE: &str = "The weekly overview could not be generated; see the articles by company.";
const COMPANY_SUMMARY_UNAVAILABLE: &str = "Summary unavailable; see this week's articles in the thread.";
const ACTIONS_UNAVAILABLE: &str = "No recommendation could be generated this week.";
const NO_ACTIONS: &str = "No action needed this week.";

const DAILY_SYSTEM_PROMPT: &str = "You write the opening paragraph of a daily competitor news digest for a strategy team. \
Write about 200 characters of plain prose in {language} that captures the day's main developments. \
Do not use numbers, statistics, counts or bullet points.";

const WEEKLY_SYSTEM_PROMPT: &str = r#"You write a weekly competitor intelligence briefing in {language}.
Respond with ONLY a JSON object of this shape:
{
  "competitor_summary": "<about 200 characters: the week's most important competitor developments>",
  "company_summaries": [{"company": "<company name>", "summary": "<about 100 characters>"}],
  "strategic_actions": "<about 200 characters: what our team should do in response>"
}
Only include companies that appear in the articles."#;

/// Model-written fields of the weekly report.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyNarrative {
    pub competitor_summary: String,
    /// (company name, summary), only for companies with articles.
    pub company_summaries: Vec<(String, String)>,
    pub strategic_actions: String,
}

#[derive(Debug, Deserialize)]
struct WeeklyReply {
    competitor_summary: String,
    #[serde(default)]
    company_summaries: Vec<CompanySummaryReply>,
    strategic_actions: String,
}

#[derive(Debug, Deserialize)]
struct CompanySummaryReply {
    company: String,
    summary: String,
}

/// Start and end (inclusive, to the microsecond) of a local calendar day.
pub fn day_window(day: NaiveDate, tz: &FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    local_span(day, day, tz)
}

/// Sunday through Saturday week containing `date`.
pub fn week_window(date: NaiveDate, tz: &FixedOffset) -> (NaiveDate, NaiveDate, DateTime<Utc>, DateTime<Utc>) {
    let sunday = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    let saturday = sunday + Duration::days(6);
    let (from, to) = local_span(sunday, saturday, tz);
    (sunday, saturday, from, to)
}

fn local_span(first: NaiveDate, last: NaiveDate, tz: &FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = Duration::seconds(tz.local_minus_utc() as i64);
    let start = first.and_time(NaiveTime::MIN) - offset;
    let next = (last + Duration::days(1)).and_time(NaiveTime::MIN) - offset;
    (
        Utc.from_utc_datetime(&start),
        Utc.from_utc_datetime(&next) - Duration::microseconds(1),
    )
}

pub struct ReportAggregator {
    repository: Arc<Repository>,
    model: Arc<dyn LanguageModel>,
    timezone: FixedOffset,
    target_language: String,
}

impl ReportAggregator {
    pub fn new(
        repository: Arc<Repository>,
        model: Arc<dyn LanguageModel>,
        timezone: FixedOffset,
        target_language: String,
    ) -> Self {
        Self {
            repository,
            model,
            timezone,
            target_language,
        }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub async fn build_daily(&self, day: NaiveDate) -> Result<ReportMessage> {
        let settings = self.channel_settings().await?;
        let (from, to) = day_window(day, &self.timezone);
        let ranked = self.ranked_articles(from, to).await?;
        let names = self.company_names().await?;

        let digest = self.daily_digest(&ranked, &names).await;
        let threaded = settings.thread_strategy == ThreadStrategy::Overflow;
        let names = Names(&names);

        let text = format::daily_main(
            day,
            settings.mention_user_id.as_deref(),
            &digest,
            &ranked,
            &names,
            threaded,
        );
        let thread_messages = if threaded {
            ranked
                .iter()
                .skip(SPOTLIGHT_LIMIT)
                .map(|a| format::overflow_line(a, &names))
                .collect()
        } else {
            Vec::new()
        };

        Ok(ReportMessage {
            kind: ReportKind::Daily,
            channel: settings.channel_id,
            text,
            thread_messages,
            article_count: ranked.len(),
        })
    }

    pub async fn build_weekly(&self, date: NaiveDate) -> Result<ReportMessage> {
        let settings = self.channel_settings().await?;
        let (start, end, from, to) = week_window(date, &self.timezone);
        let ranked = self.ranked_articles(from, to).await?;
        let names = self.company_names().await?;

        let mut by_company: Vec<(String, Vec<&EnrichedArticle>)> = Vec::new();
        for article in &ranked {
            let name = names
                .get(&article.company_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            match by_company.iter_mut().find(|(n, _)| *n == name) {
                Some((_, articles)) => articles.push(article),
                None => by_company.push((name, vec![article])),
            }
        }

        let narrative = self.weekly_narrative(&by_company).await;
        let text = format::weekly_main(
            start,
            end,
            settings.mention_user_id.as_deref(),
            ranked.len(),
            &narrative,
        );
        let thread_messages = match settings.thread_strategy {
            ThreadStrategy::Overflow => format::weekly_threads(&by_company),
            ThreadStrategy::None => Vec::new(),
        };

        Ok(ReportMessage {
            kind: ReportKind::Weekly,
            channel: settings.channel_id,
            text,
            thread_messages,
            article_count: ranked.len(),
        })
    }

    /// Ad-hoc ranking variant: the ten most important articles in the main
    /// message and one thread reply per remaining article.
    pub async fn build_ranked_digest(&self, day: NaiveDate) -> Result<ReportMessage> {
        let settings = self.channel_settings().await?;
        let (from, to) = day_window(day, &self.timezone);
        let ranked = self.ranked_articles(from, to).await?;
        let names = self.company_names().await?;
        let names = Names(&names);

        Ok(ReportMessage {
            kind: ReportKind::Digest,
            channel: settings.channel_id,
            text: format::ranked_main(day, settings.mention_user_id.as_deref(), &ranked, &names),
            thread_messages: format::ranked_overflow(&ranked, &names),
            article_count: ranked.len(),
        })
    }

    async fn channel_settings(&self) -> Result<ChannelSettings> {
        match self.repository.get_channel_settings().await? {
            Some(settings) if !settings.channel_id.trim().is_empty() => Ok(settings),
            _ => Err(AppError::Configuration(
                "no report channel is configured".into(),
            )),
        }
    }

    /// Articles in the window, most important first; ties keep newest first.
    async fn ranked_articles(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<EnrichedArticle>> {
        let mut articles = self
            .repository
            .list_enriched_articles(ArticleQuery::between(from, to))
            .await?;
        articles.sort_by(|a, b| b.importance.cmp(&a.importance));
        Ok(articles)
    }

    async fn company_names(&self) -> Result<HashMap<i64, String>> {
        Ok(self
            .repository
            .list_companies()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect())
    }

    async fn daily_digest(&self, ranked: &[EnrichedArticle], names: &HashMap<i64, String>) -> String {
        if ranked.is_empty() {
            return NO_ARTICLES_TODAY.to_string();
        }

        let listing = ranked
            .iter()
            .map(|a| {
                format!(
                    "- [{}] {}: {}",
                    names.get(&a.company_id).map(String::as_str).unwrap_or("Unknown"),
                    a.translated_title,
                    a.summary
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let request = CompletionRequest::new(
            DAILY_SYSTEM_PROMPT.replace("{language}", &self.target_language),
            format!("Today's articles:\n{listing}"),
        )
        .temperature(0.5)
        .max_tokens(400);

        match self.model.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => truncate_chars(text.trim(), 400),
            Ok(_) => SEE_ARTICLES_TODAY.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Daily digest generation failed, using canned text");
                SEE_ARTICLES_TODAY.to_string()
            }
        }
    }

    async fn weekly_narrative(&self, by_company: &[(String, Vec<&EnrichedArticle>)]) -> WeeklyNarrative {
        if by_company.is_empty() {
            return WeeklyNarrative {
                competitor_summary: NO_ARTICLES_THIS_WEEK.to_string(),
                company_summaries: Vec::new(),
                strategic_actions: NO_ACTIONS.to_string(),
            };
        }

        match self.request_weekly(by_company).await {
            Ok(reply) => {
                let company_summaries = by_company
                    .iter()
                    .map(|(company, _)| {
                        let summary = reply
                            .company_summaries
                            .iter()
                            .find(|s| s.company.trim().eq_ignore_ascii_case(company))
                            .map(|s| truncate_chars(s.summary.trim(), 200))
                            .unwrap_or_else(|| COMPANY_SUMMARY_UNAVAILABLE.to_string());
                        (company.clone(), summary)
                    })
                    .collect();
                WeeklyNarrative {
                    competitor_summary: truncate_chars(reply.competitor_summary.trim(), 400),
                    company_summaries,
                    strategic_actions: truncate_chars(reply.strategic_actions.trim(), 400),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Weekly narrative generation failed, using canned text");
                WeeklyNarrative {
                    competitor_summary: WEEKLY_SUMMARY_UNAVAILABLE.to_string(),
                    company_summaries: by_company
                        .iter()
                        .map(|(company, _)| (company.clone(), COMPANY_SUMMARY_UNAVAILABLE.to_string()))
                        .collect(),
                    strategic_actions: ACTIONS_UNAVAILABLE.to_string(),
                }
            }
        }
    }

    async fn request_weekly(&self, by_company: &[(String, Vec<&EnrichedArticle>)]) -> Result<WeeklyReply> {
        let mut listing = String::new();
        for (company, articles) in by_company {
            listing.push_str(&format!("## {company}\n"));
            for a in articles {
                listing.push_str(&format!(
                    "- ({}) {}: {}\n",
                    a.importance, a.translated_title, a.summary
                ));
            }
        }
        let request = CompletionRequest::new(
            WEEKLY_SYSTEM_PROMPT.replace("{language}", &self.target_language),
            format!("This week's articles by company:\n{listing}"),
        )
        .temperature(0.4)
        .max_tokens(1500);

        let reply = self.model.complete(&request).await?;
        parse_json_reply(&reply)
    }
}
