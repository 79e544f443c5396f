//! Reddit: hot posts of configured subreddits, via the Atom feed or the JSON listing

use super::feed::parse_feed;
use super::{Crawler, HttpFetcher, SourceResult};
use crate::config::{RedditMethod, RedditSourceConfig};
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const BASE_URL: &str = "https://www.reddit.com";
const FEED_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    permalink: String,
    author: Option<String>,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    upvote_ratio: f64,
    created_utc: Option<f64>,
}

pub struct RedditCrawler {
    config: RedditSourceConfig,
    base_url: String,
}

impl RedditCrawler {
    pub fn new(config: RedditSourceConfig) -> Self {
        Self {
            config,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_feed(&self, http: &HttpFetcher, subreddit: &str) -> SourceResult<Vec<NewArticle>> {
        let url = format!("{}/r/{}/.rss", self.base_url, subreddit);
        let body = http.get_bytes(&url, Some(FEED_TIMEOUT)).await?;
        let entries = parse_feed(&body, &url)?;

        Ok(entries
            .into_iter()
            .take(self.config.post_limit)
            .map(|entry| {
                // Atom ids look like `t3_abc123`
                let reddit_id = entry.id.strip_prefix("t3_").unwrap_or(&entry.id).to_string();
                let mut article = NewArticle::new(
                    "reddit",
                    format!("reddit-{}", reddit_id),
                    format!("[r/{}] {}", subreddit, entry.title),
                )
                .content(take_chars(&entry.text, 2000))
                .category("discussion")
                .author(entry.authors.into_iter().next().unwrap_or_else(|| "unknown".to_string()))
                .tags(subreddit)
                .extra(serde_json::json!({ "subreddit": subreddit }))
                .published_at(entry.published);
                article.url = entry.link;
                article
            })
            .collect())
    }

    async fn fetch_listing(&self, http: &HttpFetcher, subreddit: &str) -> SourceResult<Vec<NewArticle>> {
        let url = format!("{}/r/{}/hot.json", self.base_url, subreddit);
        let query = [("limit", self.config.post_limit.to_string())];
        let listing: Listing = http.get_json(&url, &query, &[]).await?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| !post.stickied)
            .map(|post| {
                let published = post
                    .created_utc
                    .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single());
                NewArticle::new("reddit", format!("reddit-{}", post.id), format!("[r/{}] {}", subreddit, post.title))
                    .url(format!("https://reddit.com{}", post.permalink))
                    .content(take_chars(&post.selftext, 2000))
                    .category("discussion")
                    .author(post.author.unwrap_or_else(|| "deleted".to_string()))
                    .tags(subreddit)
                    .extra(serde_json::json!({
                        "score": post.score,
                        "num_comments": post.num_comments,
                        "upvote_ratio": post.upvote_ratio,
                        "subreddit": subreddit,
                    }))
                    .published_at(published)
            })
            .collect())
    }
}

#[async_trait]
impl Crawler for RedditCrawler {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let mut articles = Vec::new();

        for subreddit in &self.config.subreddits {
            let result = match self.config.method {
                RedditMethod::Rss => self.fetch_feed(http, subreddit).await,
                RedditMethod::Json => self.fetch_listing(http, subreddit).await,
            };
            match result {
                Ok(posts) => articles.extend(posts),
                Err(e) => warn!("[reddit] Failed to fetch r/{}: {}", subreddit, e),
            }
        }

        Ok(articles)
    }
}
