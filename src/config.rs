//! Application configuration loaded from TOML with environment overrides

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder publish host shipped in the default configuration
pub const PLACEHOLDER_REMOTE_HOST: &str = "your-server.com";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Briefing schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local wall-clock time of the daily briefing, `HH:MM`
    pub daily_briefing_time: String,
    /// Day of the weekly briefing, e.g. `monday`
    pub weekly_briefing_day: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_briefing_time: "08:00".to_string(),
            weekly_briefing_day: "monday".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Parsed daily briefing time
    pub fn daily_time(&self) -> ConfigResult<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_briefing_time.trim(), "%H:%M").map_err(|_| {
            ConfigError::Invalid(format!(
                "daily_briefing_time must be HH:MM, got '{}'",
                self.daily_briefing_time
            ))
        })
    }

    /// Parsed weekly briefing day
    pub fn weekly_day(&self) -> ConfigResult<Weekday> {
        self.weekly_briefing_day
            .trim()
            .to_lowercase()
            .parse::<Weekday>()
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "weekly_briefing_day must be a weekday name, got '{}'",
                    self.weekly_briefing_day
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    /// Organizations whose recent releases are tracked
    pub orgs: Vec<String>,
    /// Topics searched for trending repositories
    pub topics: Vec<String>,
}

impl Default for GitHubSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 6,
            orgs: Vec::new(),
            topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
}

impl Default for HuggingFaceSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 6,
        }
    }
}

/// How Reddit posts are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedditMethod {
    /// Per-subreddit Atom feed, no credentials
    #[default]
    Rss,
    /// Public `hot.json` listing, exposes scores and stickied flags
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub method: RedditMethod,
    pub subreddits: Vec<String>,
    pub post_limit: usize,
}

impl Default for RedditSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 4,
            method: RedditMethod::default(),
            subreddits: vec!["MachineLearning".to_string(), "LocalLLaMA".to_string()],
            post_limit: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    /// Only `rsshub` is supported
    pub method: String,
    pub rsshub_base: String,
    pub accounts: Vec<String>,
}

impl Default for TwitterSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: 4,
            method: "rsshub".to_string(),
            rsshub_base: "https://rsshub.app".to_string(),
            accounts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HackerNewsSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub post_limit: usize,
}

impl Default for HackerNewsSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 4,
            post_limit: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxivSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub categories: Vec<String>,
    pub max_results: usize,
    /// Keywords added as tags when they occur in a paper's title or abstract
    pub keywords: Vec<String>,
}

impl Default for ArxivSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 12,
            categories: vec!["cs.AI".to_string(), "cs.CL".to_string(), "cs.LG".to_string()],
            max_results: 30,
            keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
}

impl Default for LeaderboardSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24,
        }
    }
}

/// A monitored vendor blog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogEntry {
    pub name: String,
    pub url: String,
    /// Feed URL; when absent the page at `url` is scraped
    #[serde(default)]
    pub rss: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteSourceConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub blogs: Vec<BlogEntry>,
}

impl Default for WebsiteSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 6,
            blogs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub github: GitHubSourceConfig,
    pub huggingface: HuggingFaceSourceConfig,
    pub reddit: RedditSourceConfig,
    pub twitter: TwitterSourceConfig,
    pub hackernews: HackerNewsSourceConfig,
    pub arxiv: ArxivSourceConfig,
    pub leaderboard: LeaderboardSourceConfig,
    pub websites: WebsiteSourceConfig,
}

impl SourcesConfig {
    /// `(name, enabled, interval_hours)` for every source, in crawl order
    pub fn schedule(&self) -> Vec<(&'static str, bool, u64)> {
        vec![
            ("github", self.github.enabled, self.github.interval_hours),
            ("huggingface", self.huggingface.enabled, self.huggingface.interval_hours),
            ("reddit", self.reddit.enabled, self.reddit.interval_hours),
            ("twitter", self.twitter.enabled, self.twitter.interval_hours),
            ("hackernews", self.hackernews.enabled, self.hackernews.interval_hours),
            ("arxiv", self.arxiv.enabled, self.arxiv.interval_hours),
            ("leaderboard", self.leaderboard.enabled, self.leaderboard.interval_hours),
            ("websites", self.websites.enabled, self.websites.interval_hours),
        ]
    }
}

/// LLM provider types supported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// OpenAI or any OpenAI-compatible endpoint
    #[default]
    OpenAI,
    Anthropic,
    Ollama,
}

impl std::fmt::Display for LlmProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderType::OpenAI => write!(f, "OpenAI"),
            LlmProviderType::Anthropic => write!(f, "Anthropic"),
            LlmProviderType::Ollama => write!(f, "Ollama"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderType,
    /// Default model, also used for judgment
    pub model: String,
    /// Override for the provider endpoint
    pub api_base: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub summarize_model: String,
    pub briefing_model: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Minimum seconds between two LLM calls
    pub min_interval_secs: f64,
    pub max_retries: usize,
    /// Base backoff delay in seconds, doubled per attempt
    pub retry_base_delay_secs: u64,
    /// API key; normally supplied through the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderType::default(),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            temperature: 0.3,
            max_tokens: 4096,
            summarize_model: "gpt-4o-mini".to_string(),
            briefing_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 120,
            min_interval_secs: 2.0,
            max_retries: 3,
            retry_base_delay_secs: 5,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Only `rsync` is supported
    pub method: String,
    pub remote_host: String,
    pub remote_user: String,
    pub remote_path: String,
    pub ssh_key: String,
    pub site_title: String,
    pub site_description: String,
    pub site_url: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            method: "rsync".to_string(),
            remote_host: PLACEHOLDER_REMOTE_HOST.to_string(),
            remote_user: "deploy".to_string(),
            remote_path: "/var/www/ai-news/".to_string(),
            ssh_key: "~/.ssh/id_rsa".to_string(),
            site_title: "AI Daily Briefing".to_string(),
            site_description: "AI 行业每日信息聚合简报".to_string(),
            site_url: "https://ai-news.example.com".to_string(),
        }
    }
}

impl PublishConfig {
    /// Whether a real remote host has been configured
    pub fn is_configured(&self) -> bool {
        !self.remote_host.trim().is_empty() && self.remote_host != PLACEHOLDER_REMOTE_HOST
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub briefings_dir: PathBuf,
    pub site_dir: PathBuf,
    /// Extra assets copied into `site/static`
    pub static_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            briefings_dir: PathBuf::from("briefings"),
            site_dir: PathBuf::from("site"),
            static_dir: None,
        }
    }
}

impl PathsConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("news.db")
    }

    /// Create every output directory
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        for dir in [&self.data_dir, &self.briefings_dir, &self.site_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub sources: SourcesConfig,
    pub llm: LlmConfig,
    pub publish: PublishConfig,
    pub paths: PathsConfig,
    /// GitHub API token, from `GITHUB_TOKEN`
    #[serde(skip)]
    pub github_token: Option<String>,
    /// HuggingFace API token, from `HF_TOKEN`
    #[serde(skip)]
    pub hf_token: Option<String>,
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when the file is missing,
    /// then apply environment overrides and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without touching the environment
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("PUBLISH_REMOTE_HOST") {
            self.publish.remote_host = host;
        }
        if let Some(user) = non_empty("PUBLISH_REMOTE_USER") {
            self.publish.remote_user = user;
        }
        if let Some(path) = non_empty("PUBLISH_REMOTE_PATH") {
            self.publish.remote_path = path;
        }
        if let Some(key) = non_empty("PUBLISH_SSH_KEY") {
            self.publish.ssh_key = key;
        }
        if let Some(base) = non_empty("LLM_API_BASE") {
            self.llm.api_base = Some(base);
        }

        let key_var = match self.llm.provider {
            LlmProviderType::OpenAI => Some("OPENAI_API_KEY"),
            LlmProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            LlmProviderType::Ollama => None,
        };
        if let Some(key) = key_var.and_then(non_empty) {
            self.llm.api_key = Some(key);
        }

        self.github_token = non_empty("GITHUB_TOKEN");
        self.hf_token = non_empty("HF_TOKEN");
    }

    /// Validate configuration settings
    pub fn validate(&self) -> ConfigResult<()> {
        self.scheduler.daily_time()?;
        self.scheduler.weekly_day()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.llm.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "llm.max_retries must be at least 1".to_string(),
            ));
        }

        for (name, enabled, interval) in self.sources.schedule() {
            if enabled && interval == 0 {
                return Err(ConfigError::Invalid(format!(
                    "sources.{}.interval_hours must be greater than 0",
                    name
                )));
            }
        }

        if self.publish.method != "rsync" {
            return Err(ConfigError::Invalid(format!(
                "publish.method '{}' is not supported (only rsync)",
                self.publish.method
            )));
        }

        Ok(())
    }
}
