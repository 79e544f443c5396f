//! News source crawlers
//!
//! Every source implements [`Crawler`]. [`run_crawler`] drives one crawl: it records the
//! status, fetches, stores the new items and never lets an error escape.

pub mod arxiv;
pub mod feed;
pub mod github;
pub mod hackernews;
pub mod huggingface;
pub mod leaderboard;
pub mod reddit;
pub mod twitter;
pub mod websites;

pub use arxiv::ArxivCrawler;
pub use github::GitHubCrawler;
pub use hackernews::HackerNewsCrawler;
pub use huggingface::HuggingFaceCrawler;
pub use leaderboard::LeaderboardCrawler;
pub use reddit::RedditCrawler;
pub use twitter::TwitterCrawler;
pub use websites::WebsiteCrawler;

use crate::config::AppConfig;
use crate::database::{DatabaseError, NewArticle, NewsDatabase, SourceState};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

pub const USER_AGENT: &str = "AI-News-Aggregator/1.0 (https://github.com/ai-news)";

/// Crawl order, also the order of the scheduler's crawl jobs
pub const SOURCE_NAMES: [&str; 8] = [
    "github",
    "huggingface",
    "reddit",
    "twitter",
    "hackernews",
    "arxiv",
    "leaderboard",
    "websites",
];

/// Crawler errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed {url}: {message}")]
    Feed { url: String, message: String },

    #[error("Unexpected response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// HTTP client that keeps consecutive requests at least `request_delay` apart
pub struct HttpFetcher {
    client: Client,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(request_delay: Duration) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            request_delay,
            last_request: Mutex::new(None),
        })
    }

    /// GET `url` after waiting out the request spacing. Any status is returned as-is.
    pub async fn throttled_get(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> SourceResult<Response> {
        {
            let mut last_request = self.last_request.lock().await;
            if let Some(previous) = *last_request {
                let elapsed = previous.elapsed();
                if elapsed < self.request_delay {
                    let wait = self.request_delay - elapsed;
                    debug!("Rate limiter: sleeping {:?} before {}", wait, url);
                    sleep(wait).await;
                }
            }
            *last_request = Some(Instant::now());
        }

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        Ok(request.send().await?)
    }

    /// GET and require a 2xx status
    pub async fn get_ok(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> SourceResult<Response> {
        let response = self.throttled_get(url, query, headers, timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> SourceResult<T> {
        let body = self.get_ok(url, query, headers, None).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn get_text(&self, url: &str, timeout: Option<Duration>) -> SourceResult<String> {
        Ok(self.get_ok(url, &[], &[], timeout).await?.text().await?)
    }

    pub async fn get_bytes(&self, url: &str, timeout: Option<Duration>) -> SourceResult<Vec<u8>> {
        Ok(self.get_ok(url, &[], &[], timeout).await?.bytes().await?.to_vec())
    }
}

/// A news source
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Value stored in `articles.source` and `source_status.source_name`
    fn name(&self) -> &'static str;

    /// Minimum spacing between two requests to this source
    fn request_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>>;
}

/// Run one crawl and return the number of new articles. Failures are recorded, not returned.
pub async fn run_crawler(crawler: &dyn Crawler, db: &NewsDatabase) -> usize {
    let name = crawler.name();
    info!("[{}] Starting crawl", name);

    if let Err(e) = db.update_source_status(name, SourceState::Running, 0, None).await {
        warn!("[{}] Failed to record running status: {}", name, e);
    }

    match crawl_and_store(crawler, db).await {
        Ok((fetched, new_count)) => {
            if let Err(e) = db.update_source_status(name, SourceState::Success, new_count, None).await {
                warn!("[{}] Failed to record success status: {}", name, e);
            }
            info!("[{}] Done. Fetched {} articles, {} new", name, fetched, new_count);
            new_count
        }
        Err(e) => {
            error!("[{}] Crawl failed: {}", name, e);
            let message = e.to_string();
            if let Err(e) = db
                .update_source_status(name, SourceState::Error, 0, Some(&message))
                .await
            {
                warn!("[{}] Failed to record error status: {}", name, e);
            }
            0
        }
    }
}

async fn crawl_and_store(crawler: &dyn Crawler, db: &NewsDatabase) -> SourceResult<(usize, usize)> {
    let http = HttpFetcher::new(crawler.request_delay())?;
    let articles = crawler.fetch(&http).await?;
    let new_count = db.save_articles(&articles).await?;
    Ok((articles.len(), new_count))
}

/// Build the crawler registered under `name`, whether or not it is enabled
pub fn build_crawler(name: &str, config: &AppConfig) -> Option<Box<dyn Crawler>> {
    let sources = &config.sources;
    let crawler: Box<dyn Crawler> = match name {
        "github" => Box::new(GitHubCrawler::new(sources.github.clone(), config.github_token.clone())),
        "huggingface" => Box::new(HuggingFaceCrawler::new(config.hf_token.clone())),
        "reddit" => Box::new(RedditCrawler::new(sources.reddit.clone())),
        "twitter" => Box::new(TwitterCrawler::new(sources.twitter.clone())),
        "hackernews" => Box::new(HackerNewsCrawler::new(sources.hackernews.clone())),
        "arxiv" => Box::new(ArxivCrawler::new(sources.arxiv.clone())),
        "leaderboard" => Box::new(LeaderboardCrawler::new()),
        "websites" => Box::new(WebsiteCrawler::new(sources.websites.clone())),
        _ => return None,
    };
    Some(crawler)
}

/// Enabled crawlers in crawl order
pub fn enabled_crawlers(config: &AppConfig) -> Vec<Box<dyn Crawler>> {
    config
        .sources
        .schedule()
        .into_iter()
        .filter(|(_, enabled, _)| *enabled)
        .filter_map(|(name, _, _)| build_crawler(name, config))
        .collect()
}
