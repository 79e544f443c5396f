//! Hacker News top stories via the Firebase API

use super::{Crawler, HttpFetcher, SourceResult};
use crate::config::HackerNewsSourceConfig;
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::warn;

const API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    by: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    descendants: i64,
    time: Option<i64>,
}

pub struct HackerNewsCrawler {
    config: HackerNewsSourceConfig,
    api_base: String,
}

impl HackerNewsCrawler {
    pub fn new(config: HackerNewsSourceConfig) -> Self {
        Self {
            config,
            api_base: API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn fetch_item(&self, http: &HttpFetcher, id: u64) -> SourceResult<Option<NewArticle>> {
        let url = format!("{}/item/{}.json", self.api_base, id);
        // Deleted items come back as `null`
        let item: Option<Item> = http.get_json(&url, &[], &[]).await?;

        let Some(item) = item else {
            return Ok(None);
        };
        if item.kind.as_deref() != Some("story") {
            return Ok(None);
        }
        let Some(link) = item.url.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        let by = item.by.unwrap_or_else(|| "unknown".to_string());
        let title = item.title.unwrap_or_default();
        let published = item.time.and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        Ok(Some(
            NewArticle::new("hackernews", format!("hn-{}", id), take_chars(&title, 200))
                .url(link)
                .content(format!(
                    "HN Score: {} | by {} | {} comments",
                    item.score, by, item.descendants
                ))
                .category("discussion")
                .author(by)
                .tags("hackernews")
                .extra(serde_json::json!({
                    "score": item.score,
                    "descendants": item.descendants,
                    "hn_id": id,
                }))
                .published_at(published),
        ))
    }
}

#[async_trait]
impl Crawler for HackerNewsCrawler {
    fn name(&self) -> &'static str {
        "hackernews"
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let url = format!("{}/topstories.json", self.api_base);
        let mut story_ids: Vec<u64> = http.get_json(&url, &[], &[]).await?;
        story_ids.truncate(self.config.post_limit);

        let mut articles = Vec::new();
        for id in story_ids {
            match self.fetch_item(http, id).await {
                Ok(Some(article)) => articles.push(article),
                Ok(None) => {}
                Err(e) => warn!("[hackernews] Failed to fetch story {}: {}", id, e),
            }
        }
        Ok(articles)
    }
}
