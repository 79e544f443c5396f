//! Multi-step jobs shared by the CLI and the scheduler
//!
//! Every job takes an [`AppContext`]: the loaded configuration, the database and the
//! process-wide LLM client. Steps that talk to remote services log their failures and let
//! the rest of the job continue; only database and filesystem errors abort a job.

use crate::ai::{BriefingGenerator, JudgmentReport, JudgmentService, LlmClient, Summarizer};
use crate::config::AppConfig;
use crate::database::{Article, Briefing, BriefingPeriod, NewsDatabase};
use crate::generator::{build_site, save_briefing_markdown};
use crate::publisher::{push_to_remote, PublishOutcome};
use crate::sources::{enabled_crawlers, run_crawler, Crawler};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Batch size of the judgment pass
const JUDGMENT_BATCH: i64 = 30;

/// Pauses between consecutive remote calls
#[derive(Debug, Clone, Copy)]
pub struct Pauses {
    pub between_crawlers: Duration,
    pub between_summaries: Duration,
    pub between_briefing_calls: Duration,
}

impl Default for Pauses {
    fn default() -> Self {
        Self {
            between_crawlers: Duration::from_secs(5),
            between_summaries: Duration::from_secs(1),
            between_briefing_calls: Duration::from_secs(3),
        }
    }
}

impl Pauses {
    pub fn none() -> Self {
        Self {
            between_crawlers: Duration::ZERO,
            between_summaries: Duration::ZERO,
            between_briefing_calls: Duration::ZERO,
        }
    }
}

/// Shared state of one process
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: Arc<NewsDatabase>,
    llm: Option<Arc<LlmClient>>,
    pauses: Pauses,
}

impl AppContext {
    /// Create the output directories, open and migrate the database and build the LLM client.
    /// A missing LLM key is not fatal here; the AI steps report it when they run.
    pub async fn open(config: AppConfig) -> Result<Self> {
        config.paths.ensure_dirs()?;
        let db_path = config.paths.database_path();
        let db = NewsDatabase::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let llm = match LlmClient::from_config(&config.llm) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("LLM client unavailable: {}", e);
                None
            }
        };

        Ok(Self::new(config, Arc::new(db), llm))
    }

    pub fn new(config: AppConfig, db: Arc<NewsDatabase>, llm: Option<Arc<LlmClient>>) -> Self {
        Self {
            config: Arc::new(config),
            db,
            llm,
            pauses: Pauses::default(),
        }
    }

    pub fn with_pauses(mut self, pauses: Pauses) -> Self {
        self.pauses = pauses;
        self
    }

    pub fn llm(&self) -> Result<Arc<LlmClient>> {
        self.llm.clone().ok_or_else(|| {
            anyhow!(
                "LLM client is not configured (provider {}); set the API key or llm.api_base",
                self.config.llm.provider
            )
        })
    }

    fn summarizer(&self) -> Result<Summarizer> {
        Ok(Summarizer::new(self.llm()?, self.db.clone()).with_pause(self.pauses.between_summaries))
    }

    fn briefing_generator(&self) -> Result<BriefingGenerator> {
        Ok(BriefingGenerator::new(self.llm()?, self.db.clone()).with_pause(self.pauses.between_briefing_calls))
    }
}

/// Run `crawlers` in order with the configured pause between them. Returns the new article count.
pub async fn run_crawlers(ctx: &AppContext, crawlers: &[Box<dyn Crawler>]) -> usize {
    let mut total = 0;
    for (i, crawler) in crawlers.iter().enumerate() {
        if i > 0 && !ctx.pauses.between_crawlers.is_zero() {
            debug!("Pausing {:?} between crawlers", ctx.pauses.between_crawlers);
            tokio::time::sleep(ctx.pauses.between_crawlers).await;
        }
        total += run_crawler(crawler.as_ref(), &ctx.db).await;
    }
    total
}

/// Judge `articles`. Without an LLM client the batch is left for a later run.
pub async fn run_judgment(ctx: &AppContext, articles: &[Article]) -> Result<JudgmentReport> {
    if articles.is_empty() {
        return Ok(JudgmentReport::default());
    }
    let llm = match ctx.llm() {
        Ok(llm) => llm,
        Err(e) => {
            warn!("Skipping judgment of {} articles: {}", articles.len(), e);
            return Ok(JudgmentReport {
                untouched: articles.len(),
                ..JudgmentReport::default()
            });
        }
    };

    let report = JudgmentService::new(llm, ctx.db.clone())
        .process_articles(articles)
        .await?;
    info!(
        "Judgment: {} selected, {} ignored, {} untouched{}",
        report.selected,
        report.ignored,
        report.untouched,
        if report.fallback { " (fallback)" } else { "" }
    );
    Ok(report)
}

/// Every enabled crawler in fixed order, then judgment of the newest unjudged articles
pub async fn run_all_crawlers(ctx: &AppContext) -> Result<usize> {
    let crawlers = enabled_crawlers(&ctx.config);
    info!("Running {} enabled crawlers", crawlers.len());
    let new_articles = run_crawlers(ctx, &crawlers).await;
    info!("Crawling done: {} new articles", new_articles);

    let pending = ctx.db.pending_judgment(JUDGMENT_BATCH).await?;
    run_judgment(ctx, &pending).await?;
    Ok(new_articles)
}

/// Summarize up to `batch_size` articles
pub async fn run_summarization(ctx: &AppContext, batch_size: i64) -> Result<usize> {
    info!("Running summarization (batch {})", batch_size);
    let count = ctx.summarizer()?.summarize_unsummarized(batch_size).await?;
    info!("Summarization complete: {} articles processed", count);
    Ok(count)
}

/// Summarization failures must not stop a briefing job
async fn summarize_best_effort(ctx: &AppContext, batch_size: i64) {
    if let Err(e) = run_summarization(ctx, batch_size).await {
        warn!("Summarization step failed: {:#}", e);
    }
}

/// Generate today's briefing for `period`, saving it as Markdown when one is produced
pub async fn generate_briefing(ctx: &AppContext, period: BriefingPeriod) -> Result<Option<Briefing>> {
    info!("Generating {} briefing", period);
    let briefing = ctx.briefing_generator()?.generate(period, Utc::now()).await?;
    match &briefing {
        Some(briefing) => {
            let path = save_briefing_markdown(briefing, &ctx.config.paths.briefings_dir).await?;
            info!("Briefing saved to {}", path.display());
        }
        None => warn!("No {} briefing generated (no articles in the window)", period),
    }
    Ok(briefing)
}

/// Push the site, logging instead of failing
async fn push_best_effort(ctx: &AppContext) {
    match push_to_remote(&ctx.config.publish, &ctx.config.paths.site_dir).await {
        Ok(PublishOutcome::Pushed) => info!("Site pushed"),
        Ok(PublishOutcome::Skipped) => {}
        Err(e) => error!("Push failed: {}", e),
    }
}

/// Rebuild the site and push it
pub async fn build_and_push(ctx: &AppContext) -> Result<()> {
    build_site(&ctx.config, &ctx.db).await?;
    push_best_effort(ctx).await;
    Ok(())
}

/// Scheduled daily job: summarize, generate the briefing and publish it when one is produced
pub async fn run_daily_briefing(ctx: &AppContext) -> Result<Option<Briefing>> {
    summarize_best_effort(ctx, 20).await;
    let briefing = generate_briefing(ctx, BriefingPeriod::Daily).await?;
    if briefing.is_some() {
        build_and_push(ctx).await?;
    }
    info!("Daily briefing pipeline complete");
    Ok(briefing)
}

/// Scheduled weekly job
pub async fn run_weekly_briefing(ctx: &AppContext) -> Result<Option<Briefing>> {
    let briefing = generate_briefing(ctx, BriefingPeriod::Weekly).await?;
    if briefing.is_some() {
        build_and_push(ctx).await?;
    }
    info!("Weekly briefing pipeline complete");
    Ok(briefing)
}

/// crawl, judge, summarize, brief, build and push
pub async fn full_pipeline(ctx: &AppContext) -> Result<()> {
    info!("=== Step 1/4: Crawling ===");
    run_all_crawlers(ctx).await?;

    info!("=== Step 2/4: Judgment + translation ===");
    let unsummarized = ctx.db.unjudged_unsummarized(JUDGMENT_BATCH).await?;
    run_judgment(ctx, &unsummarized).await?;

    info!("=== Step 3/4: Summarizing ===");
    summarize_best_effort(ctx, 10).await;

    info!("=== Step 4/4: Briefing, building and pushing ===");
    brief_best_effort(ctx).await;
    build_and_push(ctx).await?;

    info!("=== Pipeline complete ===");
    Ok(())
}

/// summarize, brief, build and push, without crawling
pub async fn refresh(ctx: &AppContext) -> Result<()> {
    info!("=== Step 1/3: Re-running summarization ===");
    summarize_best_effort(ctx, 15).await;

    info!("=== Step 2/3: Generating briefing ===");
    brief_best_effort(ctx).await;

    info!("=== Step 3/3: Building and pushing ===");
    build_and_push(ctx).await?;

    info!("=== Refresh complete ===");
    Ok(())
}

/// A failed briefing still leaves the site to be rebuilt
async fn brief_best_effort(ctx: &AppContext) {
    if let Err(e) = generate_briefing(ctx, BriefingPeriod::Daily).await {
        warn!("Briefing step failed, building the site anyway: {:#}", e);
    }
}
