//! [`ArticleSource`] backed by the MediaWiki action API and the Wikimedia
//! pageviews REST API
//!
//! Requires the `wikipedia` feature (needs reqwest)

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::SourceError;
use crate::source::ArticleSource;
use crate::types::{PageId, RelatedArticle};

pub const DEFAULT_ACTION_API: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_REST_API: &str = "https://wikimedia.org/api/rest_v1";
pub const DEFAULT_PROJECT: &str = "en.wikipedia";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const PAGEVIEW_WINDOW_DAYS: i64 = 7;

#[derive(Default)]
struct Caches {
    popularity: HashMap<String, u64>,
    link_counts: HashMap<String, u64>,
    page_ids: HashMap<String, Option<PageId>>,
    outbound_links: HashMap<PageId, Vec<String>>,
}

pub struct WikipediaSource {
    client: reqwest::Client,
    action_api: Url,
    rest_api: Url,
    project: String,
    retry_backoff: Duration,
    caches: Mutex<Caches>,
}

impl WikipediaSource {
    /// Source for English Wikipedia
    pub fn new() -> Result<Self, SourceError> {
        Self::with_endpoints(DEFAULT_ACTION_API, DEFAULT_REST_API, DEFAULT_PROJECT)
    }

    /// Source for another wiki, e.g. `("https://de.wikipedia.org/w/api.php", DEFAULT_REST_API, "de.wikipedia")`
    pub fn with_endpoints(action_api: &str, rest_api: &str, project: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(format!(
                "wikinode/{} (graph explorer; https://github.com/wikinode/wikinode)",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            action_api: parse_endpoint(action_api)?,
            rest_api: parse_endpoint(rest_api)?,
            project: project.to_string(),
            retry_backoff: RETRY_BACKOFF,
            caches: Mutex::new(Caches::default()),
        })
    }

    /// Base delay between rate-limited attempts; attempt `n` waits `n` times this
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Title of a random main-namespace article
    pub async fn random_title(&self) -> Result<Option<String>, SourceError> {
        let url = self.action_url(&[("list", "random"), ("rnnamespace", "0"), ("rnlimit", "1")]);
        let response: QueryResponse = self.get_json(url).await?;
        Ok(response
            .query
            .and_then(|query| query.random.into_iter().next())
            .map(|page| page.title))
    }

    fn cached<K, V>(&self, pick: impl FnOnce(&Caches) -> &HashMap<K, V>, key: &K) -> Option<V>
    where
        K: Eq + Hash,
        V: Clone,
    {
        let caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        pick(&caches).get(key).cloned()
    }

    fn remember(&self, store: impl FnOnce(&mut Caches)) {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        store(&mut caches);
    }

    fn action_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.action_api.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("action", "query")
                .append_pair("format", "json")
                .append_pair("formatversion", "2");
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    fn rest_url(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.rest_api.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidEndpoint(self.rest_api.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET and decode JSON, retrying HTTP 429 with a linear backoff
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(attempt, url = %url, "rate limited");
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                continue;
            }
            if !status.is_success() {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            return Ok(response.json::<T>().await?);
        }

        Err(SourceError::RateLimited {
            attempts: MAX_ATTEMPTS,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ArticleSource for WikipediaSource {
    async fn resolve_page_id(&self, title: &str) -> Result<Option<PageId>, SourceError> {
        if let Some(page_id) = self.cached(|c| &c.page_ids, &title.to_string()) {
            return Ok(page_id);
        }
        let url = self.action_url(&[("titles", title)]);
        let response: QueryResponse = self.get_json(url).await?;
        let page_id = response.first_page().and_then(Page::existing_id);
        self.remember(|c| {
            c.page_ids.insert(title.to_string(), page_id);
        });
        Ok(page_id)
    }

    async fn fetch_related_articles(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<RelatedArticle>, SourceError> {
        let limit = limit.to_string();
        let url = self.action_url(&[("list", "search"), ("srsearch", title), ("srlimit", &limit)]);
        let response: QueryResponse = self.get_json(url).await?;
        let hits = response.query.map(|query| query.search).unwrap_or_default();
        debug!(title, hits = hits.len(), "search returned");
        Ok(hits
            .into_iter()
            .map(|hit| RelatedArticle::new(hit.title).with_snippet(strip_markup(&hit.snippet)))
            .collect())
    }

    async fn fetch_link_count(&self, title: &str) -> Result<u64, SourceError> {
        if let Some(count) = self.cached(|c| &c.link_counts, &title.to_string()) {
            return Ok(count);
        }
        let url = self.action_url(&[("titles", title), ("prop", "info"), ("inprop", "linkcount")]);
        let response: QueryResponse = self.get_json(url).await?;
        let page = response.first_page();

        let mut count = page.and_then(|page| page.linkcount).unwrap_or(0);
        if count == 0 {
            // Not every wiki reports linkcount; count the outbound links instead.
            if let Some(page_id) = page.and_then(Page::existing_id) {
                count = self.fetch_all_outbound_links(page_id).await?.len() as u64;
            }
        }
        self.remember(|c| {
            c.link_counts.insert(title.to_string(), count);
        });
        Ok(count)
    }

    async fn fetch_all_outbound_links(&self, page_id: PageId) -> Result<Vec<String>, SourceError> {
        if let Some(links) = self.cached(|c| &c.outbound_links, &page_id) {
            return Ok(links);
        }
        let page_id_param = page_id.to_string();
        let mut links = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut params = vec![
                ("pageids", page_id_param.as_str()),
                ("prop", "links"),
                ("pllimit", "max"),
            ];
            if let Some(token) = continuation.as_deref() {
                params.push(("plcontinue", token));
            }
            let response: QueryResponse = self.get_json(self.action_url(&params)).await?;
            if let Some(page) = response.first_page() {
                links.extend(page.links.iter().map(|link| link.title.clone()));
            }
            continuation = response.continuation.and_then(|c| c.plcontinue);
            if continuation.is_none() {
                break;
            }
        }
        debug!(page_id, links = links.len(), "fetched outbound links");
        self.remember(|c| {
            c.outbound_links.insert(page_id, links.clone());
        });
        Ok(links)
    }

    async fn fetch_popularity(&self, title: &str) -> Result<u64, SourceError> {
        if let Some(views) = self.cached(|c| &c.popularity, &title.to_string()) {
            return Ok(views);
        }
        let (start, end) = pageview_window(Utc::now().date_naive());
        let article = title.replace(' ', "_");
        let url = self.rest_url(&[
            "metrics",
            "pageviews",
            "per-article",
            &self.project,
            "all-access",
            "all-agents",
            &article,
            "daily",
            &start,
            &end,
        ])?;

        let views = match self.get_json::<PageviewsResponse>(url).await {
            Ok(response) => response.items.iter().map(|item| item.views).sum(),
            // No recorded views in the window.
            Err(SourceError::Status { status: 404, .. }) => 0,
            Err(err) => return Err(err),
        };
        self.remember(|c| {
            c.popularity.insert(title.to_string(), views);
        });
        Ok(views)
    }

    async fn fetch_trending_titles(&self) -> Result<Vec<String>, SourceError> {
        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        let year = yesterday.format("%Y").to_string();
        let month = yesterday.format("%m").to_string();
        let day = yesterday.format("%d").to_string();
        let url = self.rest_url(&[
            "metrics",
            "pageviews",
            "top",
            &self.project,
            "all-access",
            &year,
            &month,
            &day,
        ])?;
        let response: TopResponse = self.get_json(url).await?;
        Ok(trending_titles(response))
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SourceError> {
    Url::parse(endpoint).map_err(|_| SourceError::InvalidEndpoint(endpoint.to_string()))
}

/// The 7-day pageview window ending yesterday, as `YYYYMMDD` bounds
pub fn pageview_window(today: NaiveDate) -> (String, String) {
    let end = today - chrono::Duration::days(1);
    let start = end - chrono::Duration::days(PAGEVIEW_WINDOW_DAYS - 1);
    (
        start.format("%Y%m%d").to_string(),
        end.format("%Y%m%d").to_string(),
    )
}

/// Remove the highlight markup search snippets carry
pub fn strip_markup(snippet: &str) -> String {
    static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("invalid tag regex"));

    RE_TAG
        .replace_all(snippet, "")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn trending_titles(response: TopResponse) -> Vec<String> {
    response
        .items
        .into_iter()
        .flat_map(|item| item.articles)
        .map(|article| article.article)
        .filter(|article| article != "Main_Page" && !article.starts_with("Special:"))
        .map(|article| article.replace('_', " "))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<Query>,
    #[serde(rename = "continue", default)]
    continuation: Option<Continuation>,
}

impl QueryResponse {
    fn first_page(&self) -> Option<&Page> {
        self.query.as_ref().and_then(|query| query.pages.first())
    }
}

#[derive(Debug, Default, Deserialize)]
struct Query {
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    search: Vec<SearchHit>,
    #[serde(default)]
    random: Vec<RandomPage>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    pageid: Option<PageId>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    linkcount: Option<u64>,
    #[serde(default)]
    links: Vec<PageLink>,
}

impl Page {
    fn existing_id(&self) -> Option<PageId> {
        if self.missing {
            return None;
        }
        self.pageid.filter(|id| *id > 0)
    }
}

#[derive(Debug, Deserialize)]
struct PageLink {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct RandomPage {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    #[serde(default)]
    plcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageviewsResponse {
    #[serde(default)]
    items: Vec<PageviewItem>,
}

#[derive(Debug, Deserialize)]
struct PageviewItem {
    views: u64,
}

#[derive(Debug, Deserialize)]
struct TopResponse {
    #[serde(default)]
    items: Vec<TopItem>,
}

#[derive(Debug, Deserialize)]
struct TopItem {
    #[serde(default)]
    articles: Vec<TopArticle>,
}

#[derive(Debug, Deserialize)]
struct TopArticle {
    article: String,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn pageview_window_is_seven_days_ending_yesterday() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let (start, end) = pageview_window(today);
        // 2024 is a leap year.
        assert_eq!(end, "20240301");
        assert_eq!(start, "20240224");
    }

    #[test]
    fn snippets_lose_highlight_markup() {
        let snippet = r#"The <span class="searchmatch">Rust</span> language &amp; &quot;Cargo&quot;"#;
        assert_eq!(strip_markup(snippet), r#"The Rust language & "Cargo""#);
    }

    #[test]
    fn action_urls_carry_the_query_parameters() {
        let source = WikipediaSource::new().unwrap();
        let url = source.action_url(&[("titles", "AC/DC"), ("prop", "info")]);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("en.wikipedia.org"));
        assert!(pairs.contains(&("action".into(), "query".into())));
        assert!(pairs.contains(&("titles".into(), "AC/DC".into())));
        assert!(pairs.contains(&("prop".into(), "info".into())));
    }

    #[test]
    fn rest_urls_escape_titles_as_single_segments() {
        let source = WikipediaSource::new().unwrap();
        let url = source
            .rest_url(&["metrics", "pageviews", "per-article", "en.wikipedia", "AC/DC"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article/en.wikipedia/AC%2FDC"
        );
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        assert!(matches!(
            WikipediaSource::with_endpoints("not a url", DEFAULT_REST_API, DEFAULT_PROJECT),
            Err(SourceError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn missing_pages_have_no_id() {
        let response: QueryResponse = serde_json::from_str(
            r#"{"query": {"pages": [{"ns": 0, "title": "Nope", "missing": true}]}}"#,
        )
        .unwrap();
        assert_eq!(response.first_page().and_then(Page::existing_id), None);

        let response: QueryResponse = serde_json::from_str(
            r#"{"query": {"pages": [{"pageid": 25768, "ns": 0, "title": "Rust", "linkcount": 412}]}}"#,
        )
        .unwrap();
        let page = response.first_page().unwrap();
        assert_eq!(page.existing_id(), Some(25768));
        assert_eq!(page.linkcount, Some(412));
    }

    #[test]
    fn link_pages_expose_the_continuation_token() {
        let response: QueryResponse = serde_json::from_str(
            r#"{
                "continue": {"plcontinue": "25768|0|Cargo", "continue": "||"},
                "query": {"pages": [{"pageid": 25768, "links": [{"ns": 0, "title": "LLVM"}]}]}
            }"#,
        )
        .unwrap();
        assert_eq!(
            response.continuation.and_then(|c| c.plcontinue).as_deref(),
            Some("25768|0|Cargo")
        );
    }

    #[test]
    fn trending_skips_the_main_page_and_special_pages() {
        let response: TopResponse = serde_json::from_str(
            r#"{"items": [{"articles": [
                {"article": "Main_Page", "views": 5000000, "rank": 1},
                {"article": "Special:Search", "views": 900000, "rank": 2},
                {"article": "Graph_theory", "views": 120000, "rank": 3}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(trending_titles(response), vec!["Graph theory"]);
    }

    /// Serves one canned `(status, body)` reply per connection, in order, and
    /// records each request line
    struct CannedServer {
        base: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl CannedServer {
        async fn start(replies: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = requests.clone();

            tokio::spawn(async move {
                for (status, body) in replies {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = stream.read(&mut buf).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        head.extend_from_slice(&buf[..n]);
                    }
                    let request_line = String::from_utf8_lossy(&head)
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push(request_line);

                    let reply = format!(
                        "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    stream.write_all(reply.as_bytes()).await.unwrap();
                    let _ = stream.shutdown().await;
                }
            });

            Self { base, requests }
        }

        fn source(&self) -> WikipediaSource {
            WikipediaSource::with_endpoints(
                &format!("{}/w/api.php", self.base),
                &format!("{}/api/rest_v1", self.base),
                DEFAULT_PROJECT,
            )
            .unwrap()
            .with_retry_backoff(Duration::from_millis(5))
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    const RUST_PAGE: &str = r#"{"query": {"pages": [{"pageid": 25768, "title": "Rust"}]}}"#;

    #[tokio::test]
    async fn rate_limited_requests_are_retried() {
        let server = CannedServer::start(vec![(429, "{}"), (200, RUST_PAGE)]).await;
        let source = server.source();

        assert_eq!(source.resolve_page_id("Rust").await.unwrap(), Some(25768));
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn persistent_rate_limiting_gives_up() {
        let server = CannedServer::start(vec![(429, "{}"), (429, "{}"), (429, "{}")]).await;
        let source = server.source();

        let err = source.resolve_page_id("Rust").await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited { attempts: 3, .. }));
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn outbound_links_follow_continuations() {
        let server = CannedServer::start(vec![
            (
                200,
                r#"{
                    "continue": {"plcontinue": "25768|0|Cargo", "continue": "||"},
                    "query": {"pages": [{"pageid": 25768, "links": [{"ns": 0, "title": "Borrow checker"}]}]}
                }"#,
            ),
            (
                200,
                r#"{"query": {"pages": [{"pageid": 25768, "links": [{"title": "Cargo"}, {"title": "LLVM"}]}]}}"#,
            ),
        ])
        .await;
        let source = server.source();

        let links = source.fetch_all_outbound_links(25768).await.unwrap();
        assert_eq!(links, vec!["Borrow checker", "Cargo", "LLVM"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].contains("plcontinue="));
        assert!(requests[1].contains("plcontinue=25768%7C0%7CCargo"));

        // Cached: no third request.
        assert_eq!(source.fetch_all_outbound_links(25768).await.unwrap().len(), 3);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn popularity_is_cached_per_title() {
        let server = CannedServer::start(vec![(
            200,
            r#"{"items": [{"views": 10}, {"views": 32}]}"#,
        )])
        .await;
        let source = server.source();

        assert_eq!(source.fetch_popularity("Graph theory").await.unwrap(), 42);
        assert_eq!(source.fetch_popularity("Graph theory").await.unwrap(), 42);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("/api/rest_v1/metrics/pageviews/per-article/en.wikipedia/"));
        assert!(requests[0].contains("/Graph_theory/daily/"));
    }

    #[tokio::test]
    async fn missing_pageview_data_counts_as_zero() {
        let server = CannedServer::start(vec![(404, r#"{"title": "Not found."}"#)]).await;
        let source = server.source();

        assert_eq!(source.fetch_popularity("Obscure").await.unwrap(), 0);
    }
}
