use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::escalation::Escalator;
use super::slack::{ChatClient, ChatError, OutgoingMessage, PostedMessage};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{DeliveryLog, DeliveryStatus, ReportKind};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts that end in a non-rate-limit error.
    pub max_attempts: u32,
    /// Backoff after attempt `n` is `backoff_base * 2^n`.
    pub backoff_base: Duration,
    pub default_retry_after: Duration,
    /// Rate-limit waits allowed per message before giving up.
    pub max_rate_limit_waits: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.delivery_max_attempts,
            backoff_base: Duration::from_millis(config.delivery_backoff_base_ms),
            default_retry_after: Duration::from_secs(config.default_retry_after_secs),
            max_rate_limit_waits: config.max_rate_limit_waits,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(30),
            max_rate_limit_waits: 5,
        }
    }
}

/// A fully formatted report: one main message plus thread replies.
#[derive(Debug, Clone)]
pub struct ReportMessage {
    pub kind: ReportKind,
    pub channel: String,
    pub text: String,
    pub thread_messages: Vec<String>,
    pub article_count: usize,
}

pub struct DeliveryEngine {
    chat: Arc<dyn ChatClient>,
    repository: Arc<Repository>,
    escalator: Arc<Escalator>,
    policy: RetryPolicy,
}

impl DeliveryEngine {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        repository: Arc<Repository>,
        escalator: Arc<Escalator>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            chat,
            repository,
            escalator,
            policy,
        }
    }

    /// Post the report and record exactly one delivery log row. A failed main
    /// message is escalated and returned as an error; failed thread replies
    /// only stop further replies.
    pub async fn deliver(&self, report: ReportMessage) -> Result<DeliveryLog> {
        let started_at = Utc::now();
        tracing::info!(
            kind = %report.kind,
            channel = %report.channel,
            articles = report.article_count,
            threads = report.thread_messages.len(),
            "Delivering report"
        );

        let main = OutgoingMessage::new(report.channel.clone(), report.text.clone());
        let posted = match self.send_with_retry(&main).await {
            Ok(posted) => posted,
            Err(e) => {
                let error = AppError::Chat(e);
                let log = DeliveryLog {
                    report_kind: report.kind,
                    channel: report.channel.clone(),
                    thread_count: 0,
                    article_count: report.article_count,
                    status: DeliveryStatus::Failed,
                    error_code: Some(error.code().to_string()),
                    error_message: Some(error.to_string()),
                    started_at,
                    finished_at: Utc::now(),
                };
                self.escalator
                    .escalate(&format!("delivery:{}", report.kind), &error.to_string())
                    .await;
                if let Err(e) = self.repository.append_delivery_log(log).await {
                    tracing::error!(error = %e, kind = %report.kind, "Failed to record delivery log");
                }
                return Err(AppError::Delivery(format!(
                    "{} report to {}: {error}",
                    report.kind, report.channel
                )));
            }
        };

        let mut thread_count = 0;
        for text in &report.thread_messages {
            let reply = OutgoingMessage::new(report.channel.clone(), text.clone()).in_thread(posted.ts.clone());
            match self.send_with_retry(&reply).await {
                Ok(_) => thread_count += 1,
                Err(e) => {
                    tracing::warn!(
                        sent = thread_count,
                        remaining = report.thread_messages.len() - thread_count,
                        error = %e,
                        "Thread reply failed, stopping thread"
                    );
                    break;
                }
            }
        }

        let log = DeliveryLog {
            report_kind: report.kind,
            channel: report.channel,
            thread_count,
            article_count: report.article_count,
            status: DeliveryStatus::Success,
            error_code: None,
            error_message: None,
            started_at,
            finished_at: Utc::now(),
        };
        self.repository.append_delivery_log(log.clone()).await?;
        Ok(log)
    }

    /// One logical send. Rate limits sleep for the advertised duration and do
    /// not use up an attempt; other errors back off exponentially.
    pub async fn send_with_retry(
        &self,
        message: &OutgoingMessage,
    ) -> std::result::Result<PostedMessage, ChatError> {
        let mut attempt = 0;
        let mut rate_limit_waits = 0;

        loop {
            match self.chat.post_message(message).await {
                Ok(posted) => return Ok(posted),
                Err(ChatError::RateLimited { retry_after }) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > self.policy.max_rate_limit_waits {
                        return Err(ChatError::RateLimited { retry_after });
                    }
                    let wait = retry_after.unwrap_or(self.policy.default_retry_after);
                    tracing::warn!(channel = %message.channel, wait = ?wait, "Rate limited, waiting");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        return Err(e);
                    }
                    let wait = self.policy.backoff(attempt);
                    tracing::warn!(
                        channel = %message.channel,
                        attempt,
                        wait = ?wait,
                        error = %e,
                        "Send failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
