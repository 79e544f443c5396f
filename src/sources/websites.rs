//! Vendor blogs, read from their feed or scraped from the index page

use super::feed::parse_feed;
use super::{Crawler, HttpFetcher, SourceError, SourceResult};
use crate::config::{BlogEntry, WebsiteSourceConfig};
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;
use url::Url;

const MAX_POSTS_PER_BLOG: usize = 10;
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// `blog-` plus the first 16 hex digits of the URL's SHA-256
fn blog_source_id(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    format!("blog-{}", &digest[..16])
}

fn blog_post(blog: &BlogEntry, title: &str, url: &str) -> NewArticle {
    NewArticle::new("websites", blog_source_id(url), format!("[{}] {}", blog.name, title))
        .url(url)
        .category("blog")
        .author(blog.name.clone())
        .tags("blog")
}

/// A post link found on a blog index page
#[derive(Debug, PartialEq)]
struct PostLink {
    url: String,
    title: String,
}

/// Post links from a blog index: the first link inside each `article`, `h2`, `h3` and `h4`.
/// Root-relative hrefs are resolved against `page_url`; other non-http hrefs are ignored.
fn extract_post_links(html: &str, page_url: &str) -> SourceResult<Vec<PostLink>> {
    let parse_error = |e: String| SourceError::Parse {
        url: page_url.to_string(),
        message: e,
    };
    let blocks = Selector::parse("article, h2, h3, h4").map_err(|e| parse_error(e.to_string()))?;
    let anchor = Selector::parse("a[href]").map_err(|e| parse_error(e.to_string()))?;
    let base = Url::parse(page_url)?;

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for block in document.select(&blocks) {
        let Some(link) = block.select(&anchor).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or("").trim();
        if href.is_empty() || seen.contains(href) {
            continue;
        }

        let url = if href.starts_with('/') {
            base.join(href)?.to_string()
        } else if href.starts_with("http") {
            href.to_string()
        } else {
            continue;
        };
        seen.insert(href.to_string());

        let text = link.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let title = take_chars(&text, 200);
        if title.chars().count() < 5 {
            continue;
        }

        links.push(PostLink {
            url,
            title: title.to_string(),
        });
        if links.len() >= MAX_POSTS_PER_BLOG {
            break;
        }
    }

    Ok(links)
}

pub struct WebsiteCrawler {
    config: WebsiteSourceConfig,
}

impl WebsiteCrawler {
    pub fn new(config: WebsiteSourceConfig) -> Self {
        Self { config }
    }

    async fn fetch_feed(&self, http: &HttpFetcher, blog: &BlogEntry, feed_url: &str) -> SourceResult<Vec<NewArticle>> {
        let body = http.get_bytes(feed_url, Some(PAGE_TIMEOUT)).await?;
        Ok(parse_feed(&body, feed_url)?
            .into_iter()
            .take(MAX_POSTS_PER_BLOG)
            .map(|entry| {
                let link = entry.link.unwrap_or_default();
                let title = if entry.title.is_empty() { "Untitled" } else { entry.title.as_str() };
                blog_post(blog, title, &link)
                    .content(take_chars(&entry.text, 1000))
                    .published_at(entry.published)
            })
            .collect())
    }

    async fn scrape_page(&self, http: &HttpFetcher, blog: &BlogEntry) -> SourceResult<Vec<NewArticle>> {
        let html = http.get_text(&blog.url, Some(PAGE_TIMEOUT)).await?;
        Ok(extract_post_links(&html, &blog.url)?
            .into_iter()
            .map(|post| blog_post(blog, &post.title, &post.url).content(""))
            .collect())
    }
}

#[async_trait]
impl Crawler for WebsiteCrawler {
    fn name(&self) -> &'static str {
        "websites"
    }

    fn request_delay(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let mut articles = Vec::new();

        for blog in &self.config.blogs {
            let result = match blog.rss.as_deref() {
                Some(feed_url) => self.fetch_feed(http, blog, feed_url).await,
                None => self.scrape_page(http, blog).await,
            };
            match result {
                Ok(posts) => articles.extend(posts),
                Err(e) => warn!("[websites] Failed to fetch {}: {}", blog.name, e),
            }
        }

        Ok(articles)
    }
}
