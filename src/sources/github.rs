//! GitHub: trending repositories by topic and recent releases of tracked organizations

use super::{Crawler, HttpFetcher, SourceResult};
use crate::config::GitHubSourceConfig;
use crate::database::NewArticle;
use crate::html::take_chars;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    id: u64,
    full_name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    owner: Owner,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct OrgRepository {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
    tag_name: String,
    html_url: String,
    body: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

pub struct GitHubCrawler {
    config: GitHubSourceConfig,
    token: Option<String>,
    api_base: String,
}

impl GitHubCrawler {
    pub fn new(config: GitHubSourceConfig, token: Option<String>) -> Self {
        Self {
            config,
            token,
            api_base: API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Accept", "application/vnd.github.v3+json".to_string())];
        if let Some(token) = &self.token {
            headers.push(("Authorization", format!("token {}", token)));
        }
        headers
    }

    async fn fetch_trending(&self, http: &HttpFetcher) -> Vec<NewArticle> {
        let since = (Utc::now() - Duration::days(7)).format("%Y-%m-%d").to_string();
        let url = format!("{}/search/repositories", self.api_base);
        let mut articles = Vec::new();

        for topic in &self.config.topics {
            let query = [
                ("q", format!("topic:{} pushed:>{}", topic, since)),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("per_page", "10".to_string()),
            ];
            let response: SearchResponse = match http.get_json(&url, &query, &self.headers()).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("[github] Failed to fetch trending for topic={}: {}", topic, e);
                    continue;
                }
            };

            for repo in response.items {
                let topics: Vec<&str> = repo.topics.iter().take(5).map(String::as_str).collect();
                articles.push(
                    NewArticle::new(
                        "github",
                        format!("repo-{}", repo.id),
                        format!("[GitHub Trending] {} ⭐{}", repo.full_name, repo.stargazers_count),
                    )
                    .url(repo.html_url)
                    .content(repo.description.unwrap_or_default())
                    .category("trending_repo")
                    .author(repo.owner.login)
                    .tags(topics.join(","))
                    .extra(serde_json::json!({
                        "stars": repo.stargazers_count,
                        "forks": repo.forks_count,
                        "language": repo.language,
                    }))
                    .published_at(repo.created_at),
                );
            }
        }
        articles
    }

    async fn fetch_releases(&self, http: &HttpFetcher) -> Vec<NewArticle> {
        let cutoff = Utc::now() - Duration::days(7);
        let mut articles = Vec::new();

        for org in &self.config.orgs {
            let url = format!("{}/orgs/{}/repos", self.api_base, org);
            let query = [("sort", "updated".to_string()), ("per_page", "10".to_string())];
            let repos: Vec<OrgRepository> = match http.get_json(&url, &query, &self.headers()).await {
                Ok(repos) => repos,
                Err(e) => {
                    warn!("[github] Failed to fetch repos for org={}: {}", org, e);
                    continue;
                }
            };

            for repo in repos {
                let url = format!("{}/repos/{}/releases", self.api_base, repo.full_name);
                let releases: Vec<Release> = match http
                    .get_json(&url, &[("per_page", "3".to_string())], &self.headers())
                    .await
                {
                    Ok(releases) => releases,
                    Err(e) => {
                        debug!("[github] No releases for {}: {}", repo.full_name, e);
                        continue;
                    }
                };

                for release in releases {
                    if release.published_at.is_some_and(|published| published < cutoff) {
                        continue;
                    }
                    let body = release.body.unwrap_or_default();
                    articles.push(
                        NewArticle::new(
                            "github",
                            format!("release-{}", release.id),
                            format!("[GitHub Release] {} {}", repo.full_name, release.tag_name),
                        )
                        .url(release.html_url)
                        .content(take_chars(&body, 2000))
                        .category("release")
                        .author(org.clone())
                        .tags(repo.full_name.clone())
                        .published_at(release.published_at),
                    );
                }
            }
        }
        articles
    }
}

#[async_trait]
impl Crawler for GitHubCrawler {
    fn name(&self) -> &'static str {
        "github"
    }

    fn request_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(500)
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let mut articles = self.fetch_trending(http).await;
        articles.extend(self.fetch_releases(http).await);
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> GitHubSourceConfig {
        GitHubSourceConfig {
            enabled: true,
            interval_hours: 6,
            orgs: vec!["openai".to_string()],
            topics: vec!["llm".to_string(), "broken".to_string()],
        }
    }

    #[tokio::test]
    async fn test_trending_and_releases() {
        let server = MockServer::start().await;
        let recent = (Utc::now() - Duration::days(1)).to_rfc3339();
        let old = (Utc::now() - Duration::days(30)).to_rfc3339();

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("sort", "stars"))
            .and(header("authorization", "token ghp_x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 1,
                "items": [{
                    "id": 42,
                    "full_name": "acme/agent",
                    "html_url": "https://github.com/acme/agent",
                    "description": "An agent framework",
                    "stargazers_count": 1200,
                    "forks_count": 80,
                    "language": "Rust",
                    "topics": ["llm", "agents", "rust", "ai", "tools", "extra"],
                    "owner": {"login": "acme"},
                    "created_at": "2026-01-02T03:04:05Z"
                }]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/openai/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"full_name": "openai/sdk"},
                {"full_name": "openai/norel"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/openai/sdk/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 7, "tag_name": "v1.2.0", "html_url": "https://github.com/openai/sdk/releases/v1.2.0",
                 "body": "x".repeat(2500), "published_at": recent},
                {"id": 6, "tag_name": "v1.1.0", "html_url": "https://github.com/openai/sdk/releases/v1.1.0",
                 "body": "old", "published_at": old}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/openai/norel/releases"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crawler = GitHubCrawler::new(config(), Some("ghp_x".to_string())).with_api_base(server.uri());
        let http = HttpFetcher::new(std::time::Duration::ZERO).unwrap();
        let articles = crawler.fetch(&http).await.unwrap();

        assert_eq!(articles.len(), 2);
        let repo = &articles[0];
        assert_eq!(repo.source_id.as_deref(), Some("repo-42"));
        assert_eq!(repo.title, "[GitHub Trending] acme/agent ⭐1200");
        assert_eq!(repo.category.as_deref(), Some("trending_repo"));
        assert_eq!(repo.tags.as_deref(), Some("llm,agents,rust,ai,tools"));
        assert_eq!(repo.extra_data.as_ref().unwrap()["language"], "Rust");

        let release = &articles[1];
        assert_eq!(release.source_id.as_deref(), Some("release-7"));
        assert_eq!(release.title, "[GitHub Release] openai/sdk v1.2.0");
        assert_eq!(release.content.as_ref().unwrap().chars().count(), 2000);
        assert_eq!(release.author.as_deref(), Some("openai"));
    }
}
