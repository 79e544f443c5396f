//! HuggingFace: most liked models and spaces, and the daily papers list

use super::{Crawler, HttpFetcher, SourceResult};
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const API_BASE: &str = "https://huggingface.co";

#[derive(Debug, Deserialize)]
struct Model {
    #[serde(rename = "modelId")]
    model_id: Option<String>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pipeline_tag: Option<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    likes: u64,
}

#[derive(Debug, Deserialize)]
struct DailyPaper {
    #[serde(default)]
    paper: PaperDetail,
    #[serde(rename = "numUpvotes", default)]
    num_upvotes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PaperDetail {
    #[serde(default)]
    id: String,
    title: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    authors: Vec<PaperAuthor>,
    #[serde(default)]
    upvotes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PaperAuthor {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Space {
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sdk: Option<String>,
    #[serde(default)]
    likes: u64,
}

/// Namespace part of `owner/name`, empty when there is none
fn owner_of(id: &str) -> &str {
    id.split_once('/').map(|(owner, _)| owner).unwrap_or("")
}

pub struct HuggingFaceCrawler {
    token: Option<String>,
    api_base: String,
}

impl HuggingFaceCrawler {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            api_base: API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn auth_headers(&self) -> Vec<(&'static str, String)> {
        self.token
            .iter()
            .map(|token| ("Authorization", format!("Bearer {}", token)))
            .collect()
    }

    async fn fetch_models(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let query = [
            ("sort", "likes".to_string()),
            ("direction", "-1".to_string()),
            ("limit", "20".to_string()),
        ];
        let models: Vec<Model> = http
            .get_json(&format!("{}/api/models", self.api_base), &query, &self.auth_headers())
            .await?;

        Ok(models
            .into_iter()
            .map(|model| {
                let model_id = model.model_id.unwrap_or(model.id);
                let pipeline = model.pipeline_tag.clone().unwrap_or_else(|| "N/A".to_string());
                let content = model.description.filter(|d| !d.is_empty()).unwrap_or_else(|| {
                    format!(
                        "Pipeline: {}. Downloads: {}. Likes: {}.",
                        pipeline, model.downloads, model.likes
                    )
                });

                NewArticle::new("huggingface", format!("model-{}", model_id), format!("[HF Model] {}", model_id))
                    .url(format!("https://huggingface.co/{}", model_id))
                    .content(content)
                    .category("model")
                    .author(owner_of(&model_id))
                    .tags(model.pipeline_tag.clone().unwrap_or_default())
                    .extra(serde_json::json!({
                        "downloads": model.downloads,
                        "likes": model.likes,
                        "pipeline_tag": model.pipeline_tag,
                    }))
            })
            .collect())
    }

    async fn fetch_papers(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let papers: Vec<DailyPaper> = http
            .get_json(&format!("{}/api/daily_papers", self.api_base), &[], &[])
            .await?;

        Ok(papers
            .into_iter()
            .take(20)
            .map(|entry| {
                let paper = entry.paper;
                let title = paper.title.unwrap_or_else(|| "Unknown".to_string());
                let published = paper
                    .published_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                let authors: Vec<&str> = paper.authors.iter().take(3).map(|a| a.name.as_str()).collect();
                let upvotes = entry.num_upvotes.or(paper.upvotes).unwrap_or(0);

                NewArticle::new("huggingface", format!("paper-{}", paper.id), format!("[HF Paper] {}", title))
                    .url(format!("https://huggingface.co/papers/{}", paper.id))
                    .content(take_chars(&paper.summary, 2000))
                    .category("paper")
                    .author(authors.join(", "))
                    .tags("paper")
                    .extra(serde_json::json!({ "upvotes": upvotes }))
                    .published_at(published)
            })
            .collect())
    }

    async fn fetch_spaces(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let query = [
            ("sort", "likes".to_string()),
            ("direction", "-1".to_string()),
            ("limit", "10".to_string()),
        ];
        let spaces: Vec<Space> = http
            .get_json(&format!("{}/api/spaces", self.api_base), &query, &[])
            .await?;

        Ok(spaces
            .into_iter()
            .map(|space| {
                let sdk = space.sdk.clone().unwrap_or_else(|| "N/A".to_string());
                let content = space
                    .description
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| format!("SDK: {}. Likes: {}.", sdk, space.likes));

                NewArticle::new("huggingface", format!("space-{}", space.id), format!("[HF Space] {}", space.id))
                    .url(format!("https://huggingface.co/spaces/{}", space.id))
                    .content(content)
                    .category("space")
                    .author(owner_of(&space.id))
                    .tags("space")
                    .extra(serde_json::json!({ "likes": space.likes, "sdk": space.sdk }))
            })
            .collect())
    }
}

#[async_trait]
impl Crawler for HuggingFaceCrawler {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn request_delay(&self) -> Duration {
        Duration::from_millis(1500)
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let mut articles = Vec::new();

        match self.fetch_models(http).await {
            Ok(models) => articles.extend(models),
            Err(e) => warn!("[huggingface] Failed to fetch trending models: {}", e),
        }
        match self.fetch_papers(http).await {
            Ok(papers) => articles.extend(papers),
            Err(e) => warn!("[huggingface] Failed to fetch daily papers: {}", e),
        }
        match self.fetch_spaces(http).await {
            Ok(spaces) => articles.extend(spaces),
            Err(e) => warn!("[huggingface] Failed to fetch trending spaces: {}", e),
        }

        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_models_papers_and_spaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models"))
            .and(header("authorization", "Bearer hf_x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "meta-llama/Llama-3", "modelId": "meta-llama/Llama-3", "likes": 900,
                 "downloads": 12345, "pipeline_tag": "text-generation"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/daily_papers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"paper": {"id": "2410.00001", "title": "Tiny Reasoners", "summary": "We show...",
                           "publishedAt": "2026-10-14T12:00:00.000Z",
                           "authors": [{"name": "A"}, {"name": "B"}, {"name": "C"}, {"name": "D"}]},
                 "numUpvotes": 33}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/spaces"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let crawler = HuggingFaceCrawler::new(Some("hf_x".to_string())).with_api_base(server.uri());
        let http = HttpFetcher::new(Duration::ZERO).unwrap();
        let articles = crawler.fetch(&http).await.unwrap();

        assert_eq!(articles.len(), 2);
        let model = &articles[0];
        assert_eq!(model.source_id.as_deref(), Some("model-meta-llama/Llama-3"));
        assert_eq!(
            model.content.as_deref(),
            Some("Pipeline: text-generation. Downloads: 12345. Likes: 900.")
        );
        assert_eq!(model.author.as_deref(), Some("meta-llama"));

        let paper = &articles[1];
        assert_eq!(paper.source_id.as_deref(), Some("paper-2410.00001"));
        assert_eq!(paper.title, "[HF Paper] Tiny Reasoners");
        assert_eq!(paper.author.as_deref(), Some("A, B, C"));
        assert_eq!(paper.extra_data.as_ref().unwrap()["upvotes"], 33);
        assert!(paper.published_at.is_some());
    }

    #[test]
    fn test_owner_of() {
        assert_eq!(owner_of("org/name"), "org");
        assert_eq!(owner_of("bert-base"), "");
    }
}
