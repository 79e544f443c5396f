//! Twitter/X accounts through an RSSHub bridge

use super::feed::parse_feed;
use super::{Crawler, HttpFetcher, SourceResult};
use crate::config::TwitterSourceConfig;
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::warn;

const ENTRIES_PER_ACCOUNT: usize = 10;

pub struct TwitterCrawler {
    config: TwitterSourceConfig,
}

impl TwitterCrawler {
    pub fn new(config: TwitterSourceConfig) -> Self {
        Self { config }
    }

    async fn fetch_account(&self, http: &HttpFetcher, account: &str) -> SourceResult<Vec<NewArticle>> {
        let base = self.config.rsshub_base.trim_end_matches('/');
        let url = format!("{}/twitter/user/{}", base, account);
        let body = http.get_bytes(&url, Some(Duration::from_secs(15))).await?;

        Ok(parse_feed(&body, &url)?
            .into_iter()
            .take(ENTRIES_PER_ACCOUNT)
            .map(|entry| {
                let title = take_chars(&entry.title, 200).to_string();
                let tweet_id = entry
                    .link
                    .as_deref()
                    .and_then(|link| link.trim_end_matches('/').rsplit('/').next())
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| title_digest(&title));

                let mut article = NewArticle::new(
                    "twitter",
                    format!("tweet-{}-{}", account, tweet_id),
                    format!("[Twitter @{}] {}", account, title),
                )
                .content(take_chars(&entry.text, 1000))
                .category("tweet")
                .author(account)
                .tags("twitter")
                .published_at(entry.published);
                article.url = entry.link;
                article
            })
            .collect())
    }
}

fn title_digest(title: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(title.as_bytes()));
    digest[..16].to_string()
}

#[async_trait]
impl Crawler for TwitterCrawler {
    fn name(&self) -> &'static str {
        "twitter"
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        if self.config.method != "rsshub" {
            warn!("[twitter] Only the rsshub method is supported, got '{}'", self.config.method);
            return Ok(Vec::new());
        }

        let mut articles = Vec::new();
        for account in &self.config.accounts {
            match self.fetch_account(http, account).await {
                Ok(tweets) => articles.extend(tweets),
                Err(e) => warn!("[twitter] Failed to fetch @{}: {}", account, e),
            }
        }
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TWEETS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Twitter @karpathy</title><link>https://x.com/karpathy</link><description>d</description>
<item><title>New video on tokenizers</title><link>https://x.com/karpathy/status/1790000000000000000</link>
<description>&lt;p&gt;New video on tokenizers&lt;/p&gt;</description><pubDate>Wed, 14 Oct 2026 18:00:00 GMT</pubDate></item>
<item><title>No link here</title><description>text</description></item>
</channel></rss>"#;

    fn config(method: &str, base: String) -> TwitterSourceConfig {
        TwitterSourceConfig {
            enabled: true,
            interval_hours: 4,
            method: method.to_string(),
            rsshub_base: base,
            accounts: vec!["karpathy".to_string()],
        }
    }

    #[tokio::test]
    async fn test_rsshub_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/twitter/user/karpathy"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TWEETS))
            .mount(&server)
            .await;

        let crawler = TwitterCrawler::new(config("rsshub", format!("{}/", server.uri())));
        let tweets = crawler.fetch(&HttpFetcher::new(Duration::ZERO).unwrap()).await.unwrap();

        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].source_id.as_deref(), Some("tweet-karpathy-1790000000000000000"));
        assert_eq!(tweets[0].title, "[Twitter @karpathy] New video on tokenizers");
        assert_eq!(tweets[0].category.as_deref(), Some("tweet"));
        assert_eq!(
            tweets[1].source_id.as_deref(),
            Some(format!("tweet-karpathy-{}", title_digest("No link here")).as_str())
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_returns_nothing() {
        let crawler = TwitterCrawler::new(config("api", "http://127.0.0.1:9".to_string()));
        let tweets = crawler.fetch(&HttpFetcher::new(Duration::ZERO).unwrap()).await.unwrap();
        assert!(tweets.is_empty());
    }
}
