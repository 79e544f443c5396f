//! SQLite store for articles, briefings and crawler status

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Database-related errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// An item produced by a crawler, not yet stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub source: String,
    pub source_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl NewArticle {
    /// Start an article with the fields every source provides
    pub fn new(source: &str, source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            source_id: Some(source_id.into()),
            title: title.into(),
            url: None,
            content: None,
            category: None,
            author: None,
            tags: None,
            extra_data: None,
            published_at: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn extra(mut self, extra: serde_json::Value) -> Self {
        self.extra_data = Some(extra);
        self
    }

    pub fn published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}

/// A stored article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source: String,
    pub source_id: Option<String>,
    pub title: String,
    /// Chinese headline; present once the article passed judgment
    pub ai_title: Option<String>,
    pub ai_title_en: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub summary_en: Option<String>,
    pub category: Option<String>,
    pub importance_score: Option<f64>,
    pub author: Option<String>,
    pub tags: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub ignored: bool,
    pub summarized: bool,
}

impl Article {
    /// Headline for display, preferring the AI title
    pub fn display_title(&self) -> &str {
        self.ai_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.title)
    }
}

/// LLM output for a single article
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSummary {
    pub ai_title: String,
    pub ai_title_en: String,
    pub summary: String,
    pub summary_en: String,
    pub importance_score: f64,
}

/// Result of the importance judgment for one article
#[derive(Debug, Clone, PartialEq)]
pub enum JudgmentOutcome {
    Selected { ai_title: String },
    Ignored,
}

/// Briefing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BriefingPeriod {
    Daily,
    Weekly,
}

impl BriefingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BriefingPeriod::Daily => "daily",
            BriefingPeriod::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for BriefingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BriefingPeriod {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(BriefingPeriod::Daily),
            "weekly" => Ok(BriefingPeriod::Weekly),
            other => Err(DatabaseError::InvalidValue(format!("briefing period '{}'", other))),
        }
    }
}

/// A briefing about to be stored
#[derive(Debug, Clone)]
pub struct NewBriefing {
    pub date: String,
    pub period: BriefingPeriod,
    pub title: String,
    pub title_en: Option<String>,
    pub content_markdown: String,
    pub content_markdown_en: Option<String>,
    pub content_html: Option<String>,
    pub article_count: i64,
}

/// A stored briefing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    pub id: i64,
    /// `YYYY-MM-DD`
    pub date: String,
    pub period: BriefingPeriod,
    pub title: String,
    pub title_en: Option<String>,
    pub content_markdown: String,
    pub content_markdown_en: Option<String>,
    pub content_html: Option<String>,
    pub article_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Briefing {
    /// File name of the rendered page
    pub fn page_name(&self) -> String {
        format!("briefing-{}-{}.html", self.period, self.date)
    }
}

/// Operational state of a crawler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Idle,
    Running,
    Success,
    Error,
}

impl SourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceState::Idle => "idle",
            SourceState::Running => "running",
            SourceState::Success => "success",
            SourceState::Error => "error",
        }
    }
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceState {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SourceState::Idle),
            "running" => Ok(SourceState::Running),
            "success" => Ok(SourceState::Success),
            "error" => Ok(SourceState::Error),
            other => Err(DatabaseError::InvalidValue(format!("source status '{}'", other))),
        }
    }
}

/// Crawler status row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source_name: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub status: SourceState,
    pub error_message: Option<String>,
    /// New articles from the last run
    pub articles_fetched: i64,
    /// New articles over all successful runs
    pub total_articles: i64,
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseStats {
    pub article_count: i64,
    pub briefing_count: i64,
    pub ignored_count: i64,
    pub summarized_count: i64,
}

const ARTICLE_COLUMNS: &str = "id, source, source_id, title, ai_title, ai_title_en, url, content, \
     summary, summary_en, category, importance_score, author, tags, extra_data, \
     published_at, fetched_at, ignored, summarized";

const BRIEFING_COLUMNS: &str = "id, date, period, title, title_en, content_markdown, \
     content_markdown_en, content_html, article_count, created_at";

/// Columns added after the first schema version, with their definitions
const ARTICLE_MIGRATIONS: &[(&str, &str)] = &[
    ("ai_title", "TEXT"),
    ("ai_title_en", "TEXT"),
    ("summary_en", "TEXT"),
    ("summarized", "INTEGER NOT NULL DEFAULT 0"),
];

const BRIEFING_MIGRATIONS: &[(&str, &str)] = &[
    ("title_en", "TEXT"),
    ("content_markdown_en", "TEXT"),
];

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Naive UTC timestamps written by earlier versions of the database
const LEGACY_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Timestamp columns rewritten to RFC 3339 on migration, so range filters compare as text
const TIMESTAMP_COLUMNS: &[(&str, &str)] = &[
    ("articles", "published_at"),
    ("articles", "fetched_at"),
    ("briefings", "created_at"),
    ("source_status", "last_run"),
    ("source_status", "last_success"),
];

fn parse_ts(value: &str) -> DatabaseResult<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(e) => NaiveDateTime::parse_from_str(value, LEGACY_TS_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|_| e.into()),
    }
}

fn parse_opt_ts(value: Option<String>) -> DatabaseResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_ts).transpose()
}

/// News database manager
pub struct NewsDatabase {
    pub pool: SqlitePool,
}

impl NewsDatabase {
    /// Open (creating if needed) the database at `path` and migrate it
    pub async fn new(path: &Path) -> DatabaseResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Create a new in-memory database for testing
    pub async fn new_in_memory() -> DatabaseResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One connection that never expires, otherwise the data disappears
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Create tables and add columns missing from older databases. Safe to re-run.
    async fn migrate(&self) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                source_id TEXT,
                title TEXT NOT NULL,
                ai_title TEXT,
                ai_title_en TEXT,
                url TEXT,
                content TEXT,
                summary TEXT,
                summary_en TEXT,
                category TEXT,
                importance_score REAL,
                author TEXT,
                tags TEXT,
                extra_data TEXT, -- JSON object
                published_at TEXT,
                fetched_at TEXT NOT NULL,
                ignored INTEGER NOT NULL DEFAULT 0,
                summarized INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS briefings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                period TEXT NOT NULL,
                title TEXT NOT NULL,
                title_en TEXT,
                content_markdown TEXT NOT NULL,
                content_markdown_en TEXT,
                content_html TEXT,
                article_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_status (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_name TEXT NOT NULL UNIQUE,
                last_run TEXT,
                last_success TEXT,
                status TEXT NOT NULL DEFAULT 'idle',
                error_message TEXT,
                articles_fetched INTEGER NOT NULL DEFAULT 0,
                total_articles INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        self.add_missing_columns("articles", ARTICLE_MIGRATIONS).await?;
        self.add_missing_columns("briefings", BRIEFING_MIGRATIONS).await?;
        self.normalize_timestamps().await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_source ON articles (source, source_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_fetched ON articles (fetched_at)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_briefings_date_period ON briefings (date, period)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("briefings index: {}", e)))?;

        Ok(())
    }

    async fn add_missing_columns(&self, table: &str, columns: &[(&str, &str)]) -> DatabaseResult<()> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&self.pool)
            .await?;
        let existing: HashSet<String> = rows.iter().map(|row| row.get::<String, _>("name")).collect();

        for (name, definition) in columns {
            if existing.contains(*name) {
                continue;
            }
            tracing::info!("Migrating {}: adding column {}", table, name);
            sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, name, definition))
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::Migration(format!("{}.{}: {}", table, name, e)))?;
        }
        Ok(())
    }

    async fn normalize_timestamps(&self) -> DatabaseResult<()> {
        for (table, column) in TIMESTAMP_COLUMNS {
            let legacy: Vec<(i64, String)> = sqlx::query_as(&format!(
                "SELECT rowid, {column} FROM {table} \
                 WHERE {column} IS NOT NULL AND {column} != '' AND {column} NOT LIKE '%T%'"
            ))
            .fetch_all(&self.pool)
            .await?;
            if legacy.is_empty() {
                continue;
            }

            tracing::info!("Migrating {}.{}: rewriting {} timestamps", table, column, legacy.len());
            let mut tx = self.pool.begin().await?;
            for (rowid, value) in legacy {
                let parsed = parse_ts(&value).map_err(|e| {
                    DatabaseError::Migration(format!("{}.{} value '{}': {}", table, column, value, e))
                })?;
                sqlx::query(&format!("UPDATE {table} SET {column} = ?1 WHERE rowid = ?2"))
                    .bind(ts(parsed))
                    .bind(rowid)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
        }
        Ok(())
    }

    /// Check whether an article with this source and source id is stored
    pub async fn article_exists(&self, source: &str, source_id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM articles WHERE source = ?1 AND source_id = ?2 LIMIT 1")
                .bind(source)
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Store articles, skipping ones already known by (source, source_id).
    /// Returns the number of new rows.
    pub async fn save_articles(&self, articles: &[NewArticle]) -> DatabaseResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut new_count = 0;

        for article in articles {
            if let Some(source_id) = article.source_id.as_deref() {
                if !seen.insert((article.source.as_str(), source_id)) {
                    continue;
                }
                let exists: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM articles WHERE source = ?1 AND source_id = ?2 LIMIT 1",
                )
                .bind(&article.source)
                .bind(source_id)
                .fetch_optional(&mut *tx)
                .await?;
                if exists.is_some() {
                    continue;
                }
            }

            let extra = article
                .extra_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r#"
                INSERT INTO articles (
                    source, source_id, title, url, content, category, author, tags,
                    extra_data, published_at, fetched_at, ignored, summarized
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0)
            "#,
            )
            .bind(&article.source)
            .bind(&article.source_id)
            .bind(&article.title)
            .bind(&article.url)
            .bind(&article.content)
            .bind(&article.category)
            .bind(&article.author)
            .bind(&article.tags)
            .bind(extra)
            .bind(article.published_at.map(ts))
            .bind(ts(article.fetched_at))
            .execute(&mut *tx)
            .await?;

            new_count += 1;
        }

        tx.commit().await?;
        Ok(new_count)
    }

    /// All stored article URLs
    pub async fn existing_urls(&self) -> DatabaseResult<HashSet<String>> {
        let urls: Vec<String> =
            sqlx::query_scalar("SELECT url FROM articles WHERE url IS NOT NULL AND url != ''")
                .fetch_all(&self.pool)
                .await?;
        Ok(urls.into_iter().collect())
    }

    pub async fn get_article(&self, id: i64) -> DatabaseResult<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_article).transpose()
    }

    /// Update or create the status record of a crawler
    pub async fn update_source_status(
        &self,
        source_name: &str,
        status: SourceState,
        articles_fetched: usize,
        error_message: Option<&str>,
    ) -> DatabaseResult<()> {
        let now = ts(Utc::now());
        let fetched = articles_fetched as i64;
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query(
            "SELECT last_success, total_articles FROM source_status WHERE source_name = ?1",
        )
        .bind(source_name)
        .fetch_optional(&mut *tx)
        .await?;

        let (mut last_success, mut total) = match current {
            Some(row) => (
                row.get::<Option<String>, _>("last_success"),
                row.get::<Option<i64>, _>("total_articles").unwrap_or(0),
            ),
            None => (None, 0),
        };

        if status == SourceState::Success {
            last_success = Some(now.clone());
            total += fetched;
        }

        sqlx::query(
            r#"
            INSERT INTO source_status (
                source_name, last_run, last_success, status, error_message, articles_fetched, total_articles
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(source_name) DO UPDATE SET
                last_run = excluded.last_run,
                last_success = excluded.last_success,
                status = excluded.status,
                error_message = excluded.error_message,
                articles_fetched = excluded.articles_fetched,
                total_articles = excluded.total_articles
        "#,
        )
        .bind(source_name)
        .bind(&now)
        .bind(last_success)
        .bind(status.as_str())
        .bind(error_message)
        .bind(fetched)
        .bind(total)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Articles that have not been through judgment yet, newest first
    pub async fn pending_judgment(&self, limit: i64) -> DatabaseResult<Vec<Article>> {
        self.fetch_articles(
            "ignored = 0 AND ai_title IS NULL ORDER BY fetched_at DESC LIMIT ?1",
            limit,
        )
        .await
    }

    /// Articles neither summarized nor ignored, newest first
    pub async fn unjudged_unsummarized(&self, limit: i64) -> DatabaseResult<Vec<Article>> {
        self.fetch_articles(
            "summarized = 0 AND ignored = 0 ORDER BY fetched_at DESC LIMIT ?1",
            limit,
        )
        .await
    }

    /// Articles without a summary that were not ignored, newest first
    pub async fn unsummarized(&self, limit: i64) -> DatabaseResult<Vec<Article>> {
        self.fetch_articles(
            "(summary IS NULL OR summary = '') AND ignored = 0 ORDER BY fetched_at DESC LIMIT ?1",
            limit,
        )
        .await
    }

    /// Judged articles fetched since `since`, most important first
    pub async fn briefing_candidates(&self, since: DateTime<Utc>, limit: i64) -> DatabaseResult<Vec<Article>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM articles \
             WHERE fetched_at >= ?1 AND ignored = 0 AND ai_title IS NOT NULL \
             ORDER BY importance_score DESC NULLS LAST, fetched_at DESC LIMIT ?2",
            ARTICLE_COLUMNS
        ))
        .bind(ts(since))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_article).collect()
    }

    /// Judged articles for the front page
    pub async fn top_articles(&self, limit: i64) -> DatabaseResult<Vec<Article>> {
        self.fetch_articles(
            "ignored = 0 AND ai_title IS NOT NULL \
             ORDER BY importance_score DESC NULLS LAST, fetched_at DESC LIMIT ?1",
            limit,
        )
        .await
    }

    async fn fetch_articles(&self, clause: &str, limit: i64) -> DatabaseResult<Vec<Article>> {
        let rows = sqlx::query(&format!("SELECT {} FROM articles WHERE {}", ARTICLE_COLUMNS, clause))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_article).collect()
    }

    /// Record the judgment for one article
    pub async fn apply_judgment(&self, id: i64, outcome: &JudgmentOutcome) -> DatabaseResult<()> {
        match outcome {
            JudgmentOutcome::Selected { ai_title } => {
                sqlx::query("UPDATE articles SET ai_title = ?1 WHERE id = ?2")
                    .bind(ai_title)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            JudgmentOutcome::Ignored => {
                sqlx::query("UPDATE articles SET ignored = 1 WHERE id = ?1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Store summarizer output and mark the article summarized
    pub async fn apply_summary(&self, id: i64, summary: &ArticleSummary) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE articles SET
                ai_title = ?1, ai_title_en = ?2, summary = ?3, summary_en = ?4,
                importance_score = ?5, summarized = 1
            WHERE id = ?6
        "#,
        )
        .bind(&summary.ai_title)
        .bind(&summary.ai_title_en)
        .bind(&summary.summary)
        .bind(&summary.summary_en)
        .bind(summary.importance_score)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_briefing(&self, date: &str, period: BriefingPeriod) -> DatabaseResult<Option<Briefing>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM briefings WHERE date = ?1 AND period = ?2",
            BRIEFING_COLUMNS
        ))
        .bind(date)
        .bind(period.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_briefing).transpose()
    }

    pub async fn insert_briefing(&self, briefing: &NewBriefing) -> DatabaseResult<Briefing> {
        let created_at = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO briefings (
                date, period, title, title_en, content_markdown, content_markdown_en,
                content_html, article_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        )
        .bind(&briefing.date)
        .bind(briefing.period.as_str())
        .bind(&briefing.title)
        .bind(&briefing.title_en)
        .bind(&briefing.content_markdown)
        .bind(&briefing.content_markdown_en)
        .bind(&briefing.content_html)
        .bind(briefing.article_count)
        .bind(ts(created_at))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Briefing {
            id,
            date: briefing.date.clone(),
            period: briefing.period,
            title: briefing.title.clone(),
            title_en: briefing.title_en.clone(),
            content_markdown: briefing.content_markdown.clone(),
            content_markdown_en: briefing.content_markdown_en.clone(),
            content_html: briefing.content_html.clone(),
            article_count: briefing.article_count,
            created_at,
        })
    }

    /// All briefings, newest date first
    pub async fn list_briefings(&self) -> DatabaseResult<Vec<Briefing>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM briefings ORDER BY date DESC, period ASC",
            BRIEFING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_briefing).collect()
    }

    pub async fn source_statuses(&self) -> DatabaseResult<Vec<SourceStatus>> {
        let rows = sqlx::query(
            "SELECT source_name, last_run, last_success, status, error_message, articles_fetched, total_articles \
             FROM source_status ORDER BY source_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SourceStatus {
                    source_name: row.get("source_name"),
                    last_run: parse_opt_ts(row.get("last_run"))?,
                    last_success: parse_opt_ts(row.get("last_success"))?,
                    status: row.get::<String, _>("status").parse()?,
                    error_message: row.get("error_message"),
                    articles_fetched: row.get::<Option<i64>, _>("articles_fetched").unwrap_or(0),
                    total_articles: row.get::<Option<i64>, _>("total_articles").unwrap_or(0),
                })
            })
            .collect()
    }

    /// Get database statistics
    pub async fn stats(&self) -> DatabaseResult<DatabaseStats> {
        let article_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        let briefing_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM briefings")
            .fetch_one(&self.pool)
            .await?;
        let ignored_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE ignored = 1")
            .fetch_one(&self.pool)
            .await?;
        let summarized_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE summarized = 1")
                .fetch_one(&self.pool)
                .await?;

        Ok(DatabaseStats {
            article_count,
            briefing_count,
            ignored_count,
            summarized_count,
        })
    }
}

fn row_to_article(row: SqliteRow) -> DatabaseResult<Article> {
    let extra_data = row
        .get::<Option<String>, _>("extra_data")
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s))
        .transpose()?;

    Ok(Article {
        id: row.get("id"),
        source: row.get("source"),
        source_id: row.get("source_id"),
        title: row.get("title"),
        ai_title: row.get("ai_title"),
        ai_title_en: row.get("ai_title_en"),
        url: row.get("url"),
        content: row.get("content"),
        summary: row.get("summary"),
        summary_en: row.get("summary_en"),
        category: row.get("category"),
        importance_score: row.get("importance_score"),
        author: row.get("author"),
        tags: row.get("tags"),
        extra_data,
        published_at: parse_opt_ts(row.get("published_at"))?,
        fetched_at: parse_ts(row.get::<&str, _>("fetched_at"))?,
        ignored: row.get::<Option<bool>, _>("ignored").unwrap_or(false),
        summarized: row.get::<Option<bool>, _>("summarized").unwrap_or(false),
    })
}

fn row_to_briefing(row: SqliteRow) -> DatabaseResult<Briefing> {
    Ok(Briefing {
        id: row.get("id"),
        date: row.get("date"),
        period: row.get::<String, _>("period").parse()?,
        title: row.get("title"),
        title_en: row.get("title_en"),
        content_markdown: row.get("content_markdown"),
        content_markdown_en: row.get("content_markdown_en"),
        content_html: row.get("content_html"),
        article_count: row.get::<Option<i64>, _>("article_count").unwrap_or(0),
        created_at: parse_ts(row.get::<&str, _>("created_at"))?,
    })
}
