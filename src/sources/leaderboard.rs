//! Model leaderboards: one snapshot article per leaderboard per day

use super::{Crawler, HttpFetcher, SourceResult};
use crate::database::NewArticle;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// A leaderboard that is checked for availability
#[derive(Debug, Clone)]
pub struct LeaderboardProbe {
    /// source_id prefix, the UTC date is appended
    pub key: &'static str,
    pub name: &'static str,
    pub probe_url: String,
    pub page_url: String,
    pub blurb: &'static str,
    pub tags: &'static str,
}

fn default_probes() -> Vec<LeaderboardProbe> {
    vec![
        LeaderboardProbe {
            key: "lmsys-arena",
            name: "LMSYS Chatbot Arena",
            probe_url: "https://huggingface.co/api/spaces/lmsys/chatbot-arena-leaderboard".to_string(),
            page_url: "https://huggingface.co/spaces/lmsys/chatbot-arena-leaderboard".to_string(),
            blurb: "LMSYS Chatbot Arena leaderboard snapshot. Visit the link for the latest rankings.",
            tags: "lmsys,arena,leaderboard",
        },
        LeaderboardProbe {
            key: "open-llm-lb",
            name: "Open LLM Leaderboard",
            probe_url: "https://huggingface.co/api/spaces/open-llm-leaderboard/open_llm_leaderboard".to_string(),
            page_url: "https://huggingface.co/spaces/open-llm-leaderboard/open_llm_leaderboard".to_string(),
            blurb: "Open LLM Leaderboard snapshot. Visit the link for the latest benchmark results.",
            tags: "open-llm,leaderboard,benchmark",
        },
        LeaderboardProbe {
            key: "livebench",
            name: "LiveBench",
            probe_url: "https://livebench.ai/".to_string(),
            page_url: "https://livebench.ai/".to_string(),
            blurb: "LiveBench leaderboard snapshot. Visit the link for the latest results.",
            tags: "livebench,leaderboard,benchmark",
        },
    ]
}

pub struct LeaderboardCrawler {
    probes: Vec<LeaderboardProbe>,
}

impl Default for LeaderboardCrawler {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderboardCrawler {
    pub fn new() -> Self {
        Self {
            probes: default_probes(),
        }
    }

    pub fn with_probes(probes: Vec<LeaderboardProbe>) -> Self {
        Self { probes }
    }

    async fn snapshot(&self, http: &HttpFetcher, probe: &LeaderboardProbe) -> SourceResult<Option<NewArticle>> {
        let response = http
            .throttled_get(&probe.probe_url, &[], &[], Some(PROBE_TIMEOUT))
            .await?;
        if response.status() != StatusCode::OK {
            debug!("[leaderboard] {} answered {}", probe.name, response.status());
            return Ok(None);
        }

        let today = Utc::now().format("%Y%m%d");
        Ok(Some(
            NewArticle::new(
                "leaderboard",
                format!("{}-{}", probe.key, today),
                format!("[Leaderboard] {} - Daily Snapshot", probe.name),
            )
            .url(probe.page_url.clone())
            .content(probe.blurb)
            .category("leaderboard")
            .tags(probe.tags),
        ))
    }
}

#[async_trait]
impl Crawler for LeaderboardCrawler {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    async fn fetch(&self, http: &HttpFetcher) -> SourceResult<Vec<NewArticle>> {
        let mut articles = Vec::new();
        for probe in &self.probes {
            match self.snapshot(http, probe).await {
                Ok(Some(article)) => articles.push(article),
                Ok(None) => {}
                Err(e) => warn!("[leaderboard] Failed to fetch {}: {}", probe.name, e),
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

    fn probes_at(server: &MockServer) -> Vec<LeaderboardProbe> {
        default_probes()
            .into_iter()
            .zip(["/arena", "/open-llm", "/livebench"])
            .map(|(mut probe, route)| {
                probe.probe_url = format!("{}{}", server.uri(), route);
                probe
            })
            .collect()
    }

    #[tokio::test]
    async fn test_only_reachable_boards_produce_snapshots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/arena"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "lmsys"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/open-llm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/livebench"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let crawler = LeaderboardCrawler::with_probes(probes_at(&server));
        let snapshots = crawler.fetch(&HttpFetcher::new(Duration::ZERO).unwrap()).await.unwrap();

        let today = Utc::now().format("%Y%m%d").to_string();
        let ids: Vec<_> = snapshots.iter().filter_map(|a| a.source_id.clone()).collect();
        assert_eq!(ids, vec![format!("lmsys-arena-{}", today), format!("livebench-{}", today)]);
        assert_eq!(snapshots[0].title, "[Leaderboard] LMSYS Chatbot Arena - Daily Snapshot");
        assert_eq!(
            snapshots[0].url.as_deref(),
            Some("https://huggingface.co/spaces/lmsys/chatbot-arena-leaderboard")
        );
        assert_eq!(snapshots[1].category.as_deref(), Some("leaderboard"));
    }

    #[test]
    fn test_default_probes() {
        let keys: Vec<_> = LeaderboardCrawler::new().probes.iter().map(|p| p.key).collect();
        assert_eq!(keys, vec!["lmsys-arena", "open-llm-lb", "livebench"]);
    }
}
