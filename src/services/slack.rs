use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SLACK_API_URL: &str = "https://slack.com/api";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChatError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {0}")]
    Api(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    /// Parent message to reply under.
    pub thread_ts: Option<String>,
}

impl OutgoingMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel: String,
    /// Message timestamp; doubles as the thread id for replies.
    pub ts: String,
}

/// Outbound chat API, one HTTP call per `post_message`.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn post_message(&self, message: &OutgoingMessage) -> Result<PostedMessage, ChatError>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    unfurl_links: bool,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    channel: Option<String>,
    ts: Option<String>,
    error: Option<String>,
}

pub struct SlackClient {
    client: Client,
    token: String,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl SlackClient {
    pub fn new(client: Client, token: String, messages_per_second: u32) -> Self {
        let rate = NonZeroU32::new(messages_per_second).unwrap_or(nonzero!(1u32));
        Self {
            client,
            token,
            base_url: SLACK_API_URL.to_string(),
            limiter: RateLimiter::direct(Quota::per_second(rate)),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn post_message(&self, message: &OutgoingMessage) -> Result<PostedMessage, ChatError> {
        self.limiter.until_ready().await;

        let request = PostMessageRequest {
            channel: &message.channel,
            text: &message.text,
            thread_ts: message.thread_ts.as_deref(),
            unfurl_links: false,
        };

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ChatError::RateLimited { retry_after });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport(format!("HTTP {status}: {body}")));
        }

        let body: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !body.ok {
            return match body.error.as_deref() {
                Some("ratelimited") | Some("rate_limited") => {
                    Err(ChatError::RateLimited { retry_after: None })
                }
                Some(error) => Err(ChatError::Api(error.to_string())),
                None => Err(ChatError::Api("unknown_error".into())),
            };
        }

        let ts = body
            .ts
            .ok_or_else(|| ChatError::Api("response missing ts".into()))?;
        Ok(PostedMessage {
            channel: body.channel.unwrap_or_else(|| message.channel.clone()),
            ts,
        })
    }
}

/// Used when no bot token is configured: every post fails with an API
/// error, so escalations are logged locally instead of sent.
pub struct UnconfiguredChat;

#[async_trait]
impl ChatClient for UnconfiguredChat {
    async fn post_message(&self, _message: &OutgoingMessage) -> Result<PostedMessage, ChatError> {
        Err(ChatError::Api("not_configured".into()))
    }
}
