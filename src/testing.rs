//! Fixtures and scripted collaborators shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ai::{CompletionRequest, LanguageModel};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{
    ArticleSummary, Category, EnrichedArticle, FeedSource, NewCompany, RawItem, SourceKind,
    SourceLink,
};
use crate::services::{ChatClient, ChatError, OutgoingMessage, PostedMessage};

pub async fn seeded_company(repo: &Repository, name: &str) -> i64 {
    repo.insert_company(NewCompany {
        name: name.to_string(),
        feeds: vec![FeedSource::new(SourceKind::Rss, "https://example.com/feed.xml")],
        priority: 1,
        is_active: true,
        context: None,
    })
    .await
    .unwrap()
}

pub fn raw_item(company_id: i64, title: &str, link: &str, snippet: &str) -> RawItem {
    RawItem {
        company_id,
        title: title.to_string(),
        link: link.to_string(),
        snippet: snippet.to_string(),
        source: "Wire".to_string(),
        published_at: None,
    }
}

pub fn article(
    company_id: i64,
    link: &str,
    importance: u8,
    published_at: DateTime<Utc>,
) -> EnrichedArticle {
    let mut item = raw_item(company_id, &format!("Story at {link}"), link, "snippet");
    item.published_at = Some(published_at);
    let mut summary = ArticleSummary::fallback(&item.title, "Acme");
    summary.importance = importance;
    summary.categories = vec![Category::Strategy, Category::Finance];
    summary.model_version = "test-model".into();
    EnrichedArticle::from_parts(&item, vec![SourceLink::from(&item)], summary, published_at)
}

/// Language model that replies from a queue, or with a fixed answer once the
/// queue is empty. `None` entries simulate a failed call.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Option<String>>>,
    default_reply: Option<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Option<&str>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
            default_reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());
        next.ok_or_else(|| AppError::Llm("scripted failure".into()))
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Chat client that records every message and answers from a script of
/// outcomes; once the script is exhausted every post succeeds.
pub struct RecordingChat {
    outcomes: Mutex<VecDeque<std::result::Result<(), ChatError>>>,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub attempts: Mutex<usize>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(outcomes: Vec<std::result::Result<(), ChatError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            sent: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn post_message(
        &self,
        message: &OutgoingMessage,
    ) -> std::result::Result<PostedMessage, ChatError> {
        *self.attempts.lock().unwrap() += 1;
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        outcome?;

        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(PostedMessage {
            channel: message.channel.clone(),
            ts: format!("1700000000.{:06}", sent.len()),
        })
    }
}
