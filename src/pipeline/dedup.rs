use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::ai::{truncate_chars, CompletionRequest, LanguageModel};
use crate::error::{AppError, Result};
use crate::models::{RawItem, SourceLink};

const SNIPPET_PROMPT_CHARS: usize = 400;

const SIMILARITY_PROMPT: &str = "You compare two news items and judge whether they report the same real-world story. \
Reply with ONLY a number between 0 and 1, where 1 means certainly the same story and 0 means unrelated.";

/// Items judged to describe one story. Only groups with two or more members exist.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub representative: RawItem,
    /// Every member including the representative, in input order.
    pub members: Vec<RawItem>,
    /// Lowest score that admitted a member into the group.
    pub similarity: f64,
}

impl DuplicateGroup {
    pub fn source_links(&self) -> Vec<SourceLink> {
        let mut links = vec![SourceLink::from(&self.representative)];
        links.extend(
            self.members
                .iter()
                .filter(|m| m.link != self.representative.link)
                .map(SourceLink::from),
        );
        links
    }
}

/// One item headed for enrichment, with the provenance of everything merged into it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub representative: RawItem,
    pub source_links: Vec<SourceLink>,
}

pub struct Deduplicator {
    model: Arc<dyn LanguageModel>,
    threshold: f64,
}

impl Deduplicator {
    pub fn new(model: Arc<dyn LanguageModel>, threshold: f64) -> Self {
        Self { model, threshold }
    }

    /// Group near-duplicates. Each unprocessed item opens a group and only
    /// later items are compared, against that first member alone.
    pub async fn find_groups(&self, items: &[RawItem]) -> Vec<DuplicateGroup> {
        let mut processed = vec![false; items.len()];
        let mut groups = Vec::new();

        for i in 0..items.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;

            let mut member_indices = vec![i];
            let mut lowest = 1.0_f64;

            for j in (i + 1)..items.len() {
                if processed[j] {
                    continue;
                }
                let score = self.similarity(&items[i], &items[j]).await;
                if score >= self.threshold {
                    processed[j] = true;
                    member_indices.push(j);
                    lowest = lowest.min(score);
                }
            }

            if member_indices.len() < 2 {
                continue;
            }

            let members: Vec<RawItem> = member_indices.iter().map(|&k| items[k].clone()).collect();
            let representative = pick_representative(&members);
            tracing::debug!(
                representative = %representative.link,
                size = members.len(),
                similarity = lowest,
                "Found duplicate group"
            );
            groups.push(DuplicateGroup {
                representative,
                members,
                similarity: lowest,
            });
        }

        groups
    }

    /// Collapse a company's items into enrichment candidates: one per
    /// duplicate group plus every item that belongs to no group.
    pub async fn collapse(&self, items: Vec<RawItem>) -> Vec<Candidate> {
        let groups = self.find_groups(&items).await;

        let mut grouped_links: HashSet<&str> = HashSet::new();
        for group in &groups {
            grouped_links.extend(group.members.iter().map(|m| m.link.as_str()));
        }

        let mut candidates: Vec<Candidate> = items
            .iter()
            .filter(|item| !grouped_links.contains(item.link.as_str()))
            .map(|item| Candidate {
                representative: item.clone(),
                source_links: vec![SourceLink::from(item)],
            })
            .collect();

        candidates.extend(groups.iter().map(|group| Candidate {
            representative: group.representative.clone(),
            source_links: group.source_links(),
        }));

        candidates
    }

    /// Similarity in [0, 1]; falls back to title token overlap when the model
    /// call fails or returns something unparseable.
    pub async fn similarity(&self, a: &RawItem, b: &RawItem) -> f64 {
        match self.model_similarity(a, b).await {
            Ok(score) => score,
            Err(e) => {
                let score = token_overlap(&a.title, &b.title);
                tracing::debug!(error = %e, score, "Similarity model unavailable, using token overlap");
                score
            }
        }
    }

    async fn model_similarity(&self, a: &RawItem, b: &RawItem) -> Result<f64> {
        let prompt = format!(
            "Item A\nTitle: {}\nText: {}\n\nItem B\nTitle: {}\nText: {}",
            a.title,
            truncate_chars(&a.snippet, SNIPPET_PROMPT_CHARS),
            b.title,
            truncate_chars(&b.snippet, SNIPPET_PROMPT_CHARS),
        );
        let request = CompletionRequest::new(SIMILARITY_PROMPT, prompt)
            .temperature(0.0)
            .max_tokens(10);

        let reply = self
            .model
            .complete(&request)
            .await
            .map_err(|e| AppError::Similarity(e.to_string()))?;
        parse_score(&reply)
    }
}

fn pick_representative(members: &[RawItem]) -> RawItem {
    let mut best = &members[0];
    for member in &members[1..] {
        if member.snippet.chars().count() > best.snippet.chars().count() {
            best = member;
        }
    }
    best.clone()
}

fn number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").ok())
        .as_ref()
}

fn parse_score(reply: &str) -> Result<f64> {
    let raw = number_pattern()
        .and_then(|p| p.find(reply))
        .ok_or_else(|| AppError::Similarity(format!("no score in reply: {reply}")))?;
    let value: f64 = raw
        .as_str()
        .parse()
        .map_err(|_| AppError::Similarity(format!("bad score: {}", raw.as_str())))?;

    // Some replies come back as a percentage.
    let value = if value > 1.0 && value <= 100.0 { value / 100.0 } else { value };
    if !(0.0..=1.0).contains(&value) {
        return Err(AppError::Similarity(format!("score out of range: {value}")));
    }
    Ok(value)
}

fn title_tokens(title: &str) -> HashSet<String> {
    title
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard overlap of lowercase title words.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let left = title_tokens(a);
    let right = title_tokens(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}
