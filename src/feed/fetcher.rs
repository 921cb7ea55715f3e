use std::collections::{HashMap, HashSet};
use std::time::Duration;

use feed_rs::parser;
use reqwest::Client;
use tokio::time::Instant;

use crate::ai::truncate_chars;
use crate::error::{AppError, Result};
use crate::models::{Company, FeedSource, RawItem, SourceKind};

const SNIPPET_MAX_CHARS: usize = 600;

/// Best-effort, single-attempt fetcher for syndication, social and search feeds.
pub struct FeedFetcher {
    client: Client,
    search_delay: Duration,
}

impl FeedFetcher {
    pub fn new(client: Client, search_delay: Duration) -> Self {
        Self {
            client,
            search_delay,
        }
    }

    pub fn default_client() -> Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("rival-watch/1.0")
            .build()?)
    }

    /// Fetch every configured feed of a company, one after another, appending
    /// to `items` as each feed completes so a cancelled call keeps what was
    /// already fetched. A feed that cannot be fetched or parsed contributes
    /// zero items; links already in `items` are skipped.
    pub async fn fetch_company(&self, company: &Company, items: &mut Vec<RawItem>) {
        let mut seen: HashSet<String> = items.iter().map(|i| i.link.clone()).collect();
        let mut last_search_call: HashMap<String, Instant> = HashMap::new();

        for source in &company.feeds {
            if source.kind == SourceKind::Search {
                self.throttle_search(&source.url, &mut last_search_call).await;
            }

            match self.fetch_source(company.id, source).await {
                Ok(fetched) => {
                    tracing::debug!(
                        company = %company.name,
                        kind = %source.kind,
                        url = %source.url,
                        count = fetched.len(),
                        "Fetched feed"
                    );
                    items.extend(fetched.into_iter().filter(|item| seen.insert(item.link.clone())));
                }
                Err(e) => {
                    tracing::warn!(
                        company = %company.name,
                        url = %source.url,
                        error = %e,
                        "Feed fetch failed, skipping"
                    );
                }
            }
        }
    }

    pub async fn fetch_source(&self, company_id: i64, source: &FeedSource) -> Result<Vec<RawItem>> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| fetch_error(&source.url, e))?;

        if !response.status().is_success() {
            return Err(fetch_error(&source.url, format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(&source.url, e))?;

        parse_items(company_id, &source.url, &bytes[..])
    }

    async fn throttle_search(&self, url: &str, last_call: &mut HashMap<String, Instant>) {
        let host = host_of(url).unwrap_or_else(|| url.to_string());
        if let Some(previous) = last_call.get(&host) {
            let elapsed = previous.elapsed();
            if elapsed < self.search_delay {
                tokio::time::sleep(self.search_delay - elapsed).await;
            }
        }
        last_call.insert(host, Instant::now());
    }
}

fn fetch_error(url: &str, reason: impl ToString) -> AppError {
    AppError::Fetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Parse a feed document into raw items, dropping entries without a title or link.
pub(crate) fn parse_items(company_id: i64, url: &str, body: &[u8]) -> Result<Vec<RawItem>> {
    let feed = parser::parse(body).map_err(|e| fetch_error(url, e))?;

    let source = feed
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| host_of(url))
        .unwrap_or_else(|| url.to_string());

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())?;
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|l| !l.is_empty())?;

            let html = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
                .unwrap_or_default();

            Some(RawItem {
                company_id,
                title,
                link,
                snippet: to_snippet(&html),
                source: source.clone(),
                published_at: entry.published.or(entry.updated),
            })
        })
        .collect();

    Ok(items)
}

fn to_snippet(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = html2text::from_read(html.as_bytes(), 10_000).unwrap_or_else(|_| html.to_string());
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, SNIPPET_MAX_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Tech Wire</title>
  <link>https://wire.example.com</link>
  <description>news</description>
  <item>
    <title>Acme launches new app</title>
    <link>https://wire.example.com/acme-app</link>
    <description>&lt;p&gt;Acme   shipped &lt;b&gt;an app&lt;/b&gt;.&lt;/p&gt;</description>
    <pubDate>Tue, 05 May 2026 09:00:00 GMT</pubDate>
  </item>
  <item>
    <link>https://wire.example.com/untitled</link>
    <description>No title here</description>
  </item>
  <item>
    <title>Link-less story</title>
  </item>
</channel></rss>"#;

    fn company(feeds: Vec<FeedSource>) -> Company {
        Company {
            id: 3,
            name: "Acme".into(),
            feeds,
            priority: 0,
            is_active: true,
            context: None,
        }
    }

    #[test]
    fn entries_without_title_or_link_are_dropped() {
        let items = parse_items(3, "https://wire.example.com/rss", RSS.as_bytes()).unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.company_id, 3);
        assert_eq!(item.title, "Acme launches new app");
        assert_eq!(item.link, "https://wire.example.com/acme-app");
        assert_eq!(item.source, "Tech Wire");
        assert!(item.snippet.contains("Acme shipped"));
        assert!(!item.snippet.contains("<b>"));
        assert!(item.published_at.is_some());
    }

    #[test]
    fn garbage_is_a_fetch_error() {
        let err = parse_items(1, "https://x.example.com", b"not a feed").unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }

    #[tokio::test]
    async fn failing_urls_contribute_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(FeedFetcher::default_client().unwrap(), Duration::ZERO);
        let company = company(vec![
            FeedSource::new(SourceKind::Rss, format!("{}/broken.xml", server.uri())),
            FeedSource::new(SourceKind::Social, format!("{}/garbage.xml", server.uri())),
            FeedSource::new(SourceKind::Search, format!("{}/good.xml", server.uri())),
        ]);

        let mut items = Vec::new();
        fetcher.fetch_company(&company, &mut items).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Acme launches new app");
    }

    #[tokio::test]
    async fn company_without_feeds_yields_nothing() {
        let fetcher = FeedFetcher::new(FeedFetcher::default_client().unwrap(), Duration::ZERO);
        let mut items = Vec::new();
        fetcher.fetch_company(&company(vec![]), &mut items).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn repeated_search_calls_to_one_host_are_spaced_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let delay = Duration::from_millis(150);
        let fetcher = FeedFetcher::new(FeedFetcher::default_client().unwrap(), delay);
        let company = company(vec![
            FeedSource::new(SourceKind::Search, format!("{}/search?q=acme", server.uri())),
            FeedSource::new(SourceKind::Search, format!("{}/search?q=acme+app", server.uri())),
        ]);

        let started = std::time::Instant::now();
        let mut items = Vec::new();
        fetcher.fetch_company(&company, &mut items).await;

        // both feeds were requested; the shared story is kept once
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        assert_eq!(items.len(), 1);
        assert!(started.elapsed() >= delay);
    }
}
