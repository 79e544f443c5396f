//! arXiv: newest submissions in the configured categories, from the Atom query API

use super::feed::parse_feed;
use super::{Crawler, HttpFetcher, SourceResult};
use crate::config::ArxivSourceConfig;
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use std::time::Duration;

const API_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivCrawler {
    config: ArxivSourceConfig,
    api_url: String,
}

impl ArxivCrawler {
    pub fn new(config: ArxivSourceConfig) -> Self {
        Self {
            config,
            api_url: API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn search_query(&self) -> String {
        self.config
            .categories
            .iter()
            .map(|cat| format!("cat:{}", cat))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Configured keywords found in the title or abstract, at most 3
    fn matched_keywords(&self, title: &str, summary: &str) -> Vec<String> {
        let title = title.to_lowercase();
        let summary = summary.to_lowercase();
        self.config
            .keywords
            .iter()
            .filter(|kw| {
                let kw = kw.to_lowercase();
                title.contains(&kw) || summary.contains(&kw)
            })
            .take(3)
            .cloned()
            .collect()
    }
}

/// `2410.00001v1` from `http://arxiv.org/abs/2410.00001v1`
fn arxiv_id(entry_id: &str) -> &str {
    entry_id.rsplit_once("/abs/").map(|(_, id)| id).unwrap_or(entry_id)
}

#[async_trait]
impl Crawler for ArxivCrawler {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    // export.arxiv.org asks clients to wait 3 s between calls
    fn request_delay(&self) -> Duration {
        Duration::from_secs(3)
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let query = [
            ("search_query", self.search_query()),
            ("sortBy", "submittedDate".to_string()),
            ("sortOrder", "descending".to_string()),
            ("start", "0".to_string()),
            ("max_results", self.config.max_results.to_string()),
        ];
        let body = http
            .get_ok(&self.api_url, &query, &[], Some(Duration::from_secs(60)))
            .await?
            .bytes()
            .await?;

        Ok(parse_feed(&body, &self.api_url)?
            .into_iter()
            .take(self.config.max_results)
            .map(|entry| {
                let mut tags: Vec<String> = entry.categories.iter().take(3).cloned().collect();
                tags.extend(self.matched_keywords(&entry.title, &entry.text));
                let authors: Vec<&str> = entry.authors.iter().take(5).map(String::as_str).collect();

                NewArticle::new(
                    "arxiv",
                    format!("arxiv-{}", arxiv_id(&entry.id)),
                    format!("[Arxiv] {}", entry.title),
                )
                .url(entry.id.clone())
                .content(take_chars(&entry.text, 2000))
                .category("paper")
                .author(authors.join(", "))
                .tags(tags.join(","))
                .published_at(entry.published)
            })
            .collect())
    }
}
