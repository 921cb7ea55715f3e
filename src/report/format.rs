use std::collections::HashMap;

use chrono::NaiveDate;

use super::aggregator::WeeklyNarrative;
use crate::models::EnrichedArticle;

/// Articles spotlighted in the daily report's main message.
pub const SPOTLIGHT_LIMIT: usize = 5;
/// Entries in the ranked digest's main message.
pub const MAIN_MESSAGE_LIMIT: usize = 10;

pub(crate) struct Names<'a>(pub &'a HashMap<i64, String>);

impl Names<'_> {
    fn of(&self, article: &EnrichedArticle) -> &str {
        self.0
            .get(&article.company_id)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

/// Escape the three characters Slack treats as control sequences.
pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn link(article: &EnrichedArticle, label: &str) -> String {
    format!("<{}|{}>", article.primary_link(), escape(label))
}

fn mention_prefix(mention: Option<&str>) -> String {
    match mention {
        Some(user) if !user.is_empty() => format!("<@{}> ", user.trim_start_matches('@')),
        _ => String::new(),
    }
}

/// One-line entry used for overflow thread replies.
pub(crate) fn overflow_line(article: &EnrichedArticle, names: &Names) -> String {
    format!(
        "• {} ({}, {})",
        link(article, &article.headline),
        escape(names.of(article)),
        article.importance
    )
}

pub(crate) fn daily_main(
    day: NaiveDate,
    mention: Option<&str>,
    digest: &str,
    ranked: &[EnrichedArticle],
    names: &Names,
    overflow_in_thread: bool,
) -> String {
    let mut text = format!(
        "{}*Competitor news for {}* ({} articles)\n{}\n",
        mention_prefix(mention),
        day.format("%Y-%m-%d"),
        ranked.len(),
        escape(digest)
    );

    if !ranked.is_empty() {
        text.push_str("\n*Spotlight*\n");
        for (i, article) in ranked.iter().take(SPOTLIGHT_LIMIT).enumerate() {
            text.push_str(&format!(
                "{}. *{}* ({}, {})\n    {}\n",
                i + 1,
                link(article, &article.translated_title),
                escape(names.of(article)),
                article.importance,
                escape(&article.summary)
            ));
        }
    }

    let overflow = ranked.len().saturating_sub(SPOTLIGHT_LIMIT);
    if overflow > 0 {
        let note = if overflow_in_thread {
            format!("_{overflow} more articles in the thread._")
        } else {
            format!("_{overflow} more articles not shown._")
        };
        text.push('\n');
        text.push_str(&note);
    }
    text
}

pub(crate) fn weekly_main(
    start: NaiveDate,
    end: NaiveDate,
    mention: Option<&str>,
    article_count: usize,
    narrative: &WeeklyNarrative,
) -> String {
    let mut text = format!(
        "{}*Weekly competitor report {} ~ {}* ({} articles)\n\n*Overview*\n{}\n",
        mention_prefix(mention),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
        article_count,
        escape(&narrative.competitor_summary)
    );

    if !narrative.company_summaries.is_empty() {
        text.push_str("\n*By company*\n");
        for (company, summary) in &narrative.company_summaries {
            text.push_str(&format!("• *{}*: {}\n", escape(company), escape(summary)));
        }
    }

    text.push_str(&format!(
        "\n*Recommended actions*\n{}",
        escape(&narrative.strategic_actions)
    ));
    text
}

/// One thread reply per company listing its articles by importance.
pub(crate) fn weekly_threads(by_company: &[(String, Vec<&EnrichedArticle>)]) -> Vec<String> {
    by_company
        .iter()
        .map(|(company, articles)| {
            let mut text = format!("*{}* ({} articles)\n", escape(company), articles.len());
            for article in articles {
                text.push_str(&format!(
                    "• {} ({})\n",
                    link(article, &article.headline),
                    article.importance
                ));
            }
            text.trim_end().to_string()
        })
        .collect()
}

pub(crate) fn ranked_main(
    day: NaiveDate,
    mention: Option<&str>,
    ranked: &[EnrichedArticle],
    names: &Names,
) -> String {
    let mut text = format!(
        "{}*Top competitor news for {}*\n",
        mention_prefix(mention),
        day.format("%Y-%m-%d")
    );
    if ranked.is_empty() {
        text.push_str("No competitor articles.");
        return text;
    }
    for (i, article) in ranked.iter().take(MAIN_MESSAGE_LIMIT).enumerate() {
        text.push_str(&format!(
            "{}. {} ({})\n",
            i + 1,
            link(article, &article.headline),
            escape(names.of(article))
        ));
    }
    text.trim_end().to_string()
}

pub(crate) fn ranked_overflow(ranked: &[EnrichedArticle], names: &Names) -> Vec<String> {
    ranked
        .iter()
        .enumerate()
        .skip(MAIN_MESSAGE_LIMIT)
        .map(|(i, article)| {
            format!(
                "{}. {} ({})",
                i + 1,
                link(article, &article.headline),
                escape(names.of(article))
            )
        })
        .collect()
}
