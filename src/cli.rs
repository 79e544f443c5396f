use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::database::{BriefingPeriod, DatabaseStats, SourceStatus};
use crate::generator::build_site;
use crate::pipeline::{self, AppContext};
use crate::publisher::{push_to_remote, PublishOutcome};
use crate::scheduler::Scheduler;

/// AI News Aggregator - AI 行业信息聚合系统
#[derive(Parser)]
#[command(name = "ai-news")]
#[command(about = "Collects AI industry news, summarizes it and publishes briefings as a static site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the scheduler and run until interrupted
    Run,

    /// Run all enabled crawlers once
    Crawl,

    /// Crawl, keeping only articles whose URL is not stored yet
    Incremental,

    /// Summarize pending articles
    Summarize {
        /// Number of articles to summarize
        #[arg(long, default_value_t = 30)]
        batch_size: i64,
    },

    /// Generate a briefing (daily by default)
    Briefing {
        /// Generate the weekly briefing instead
        #[arg(long)]
        weekly: bool,
    },

    /// Build the static site
    Build,

    /// Push the static site to the remote server
    Push,

    /// crawl, judge, summarize, brief, build and push
    Pipeline,

    /// Re-summarize, regenerate the briefing, rebuild and push without crawling
    Refresh,

    /// Show source status and totals
    Status,
}

/// Command-line interface handler
pub struct CliHandler {
    ctx: Arc<AppContext>,
}

impl CliHandler {
    /// Load the configuration, create the directories and open the database
    pub async fn new(config_path: &Path) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        Ok(Self::with_context(AppContext::open(config).await?))
    }

    pub fn with_context(ctx: AppContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run => self.handle_run().await,
            Commands::Crawl => {
                info!("Running all crawlers...");
                pipeline::run_all_crawlers(&self.ctx).await?;
                info!("Crawl complete.");
                Ok(())
            }
            Commands::Incremental => self.handle_incremental().await,
            Commands::Summarize { batch_size } => {
                info!("Summarizing up to {} articles...", batch_size);
                let count = pipeline::run_summarization(&self.ctx, batch_size).await?;
                info!("Summarized {} articles.", count);
                Ok(())
            }
            Commands::Briefing { weekly } => {
                let period = if weekly {
                    BriefingPeriod::Weekly
                } else {
                    BriefingPeriod::Daily
                };
                pipeline::generate_briefing(&self.ctx, period).await?;
                Ok(())
            }
            Commands::Build => {
                info!("Building static site...");
                let pages = build_site(&self.ctx.config, &self.ctx.db).await?;
                info!(
                    "Static site built in {} ({} briefing pages).",
                    self.ctx.config.paths.site_dir.display(),
                    pages
                );
                Ok(())
            }
            Commands::Push => self.handle_push().await,
            Commands::Pipeline => pipeline::full_pipeline(&self.ctx).await,
            Commands::Refresh => pipeline::refresh(&self.ctx).await,
            Commands::Status => self.handle_status().await,
        }
    }

    async fn handle_run(&self) -> Result<()> {
        info!("Starting AI News Aggregator scheduler...");
        let scheduler = Scheduler::new(self.ctx.clone())?;
        scheduler.run().await
    }

    async fn handle_incremental(&self) -> Result<()> {
        info!("Running incremental crawl (new articles only)...");
        let existing = self.ctx.db.existing_urls().await?;
        info!("Skipping {} existing articles...", existing.len());
        pipeline::run_all_crawlers(&self.ctx).await?;
        info!("Incremental crawl complete.");
        Ok(())
    }

    /// Fails when nothing was pushed, so the process exits non-zero
    async fn handle_push(&self) -> Result<()> {
        info!("Pushing site to remote server...");
        match push_to_remote(&self.ctx.config.publish, &self.ctx.config.paths.site_dir).await {
            Ok(PublishOutcome::Pushed) => {
                info!("Push successful.");
                Ok(())
            }
            Ok(PublishOutcome::Skipped) => {
                warn!("Push skipped, remote host is not configured.");
                bail!("push failed: remote host is not configured")
            }
            Err(e) => {
                error!("Push failed. Check logs for details.");
                Err(e.into())
            }
        }
    }

    async fn handle_status(&self) -> Result<()> {
        let stats = self.ctx.db.stats().await?;
        let statuses = self.ctx.db.source_statuses().await?;
        print!("{}", format_status(&stats, &statuses));
        Ok(())
    }
}

/// The `status` report
pub fn format_status(stats: &DatabaseStats, statuses: &[SourceStatus]) -> String {
    let mut out = String::new();
    out.push_str("\n📊 AI News Aggregator Status\n");
    out.push_str(&format!("{}\n", "=".repeat(60)));
    out.push_str(&format!("Total articles: {}\n", stats.article_count));
    out.push_str(&format!("Total briefings: {}\n", stats.briefing_count));
    out.push_str(&format!(
        "\n{:<20} {:<10} {:<20} {:<8}\n",
        "Source", "Status", "Last Run", "Total"
    ));
    out.push_str(&format!("{}\n", "-".repeat(60)));
    for status in statuses {
        let last_run = status
            .last_run
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "—".to_string());
        out.push_str(&format!(
            "{:<20} {:<10} {:<20} {:<8}\n",
            status.source_name,
            status.status.to_string(),
            last_run,
            status.total_articles
        ));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SourceState;
    use chrono::{TimeZone, Utc};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["ai-news", "summarize"]).unwrap();
        assert_eq!(cli.command, Commands::Summarize { batch_size: 30 });
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        assert!(!cli.verbose);

        let cli = Cli::try_parse_from(["ai-news", "-v", "--config", "/etc/news.toml", "briefing", "--weekly"]).unwrap();
        assert_eq!(cli.command, Commands::Briefing { weekly: true });
        assert_eq!(cli.config, PathBuf::from("/etc/news.toml"));
        assert!(cli.verbose);

        let cli = Cli::try_parse_from(["ai-news", "summarize", "--batch-size", "5", "--verbose"]).unwrap();
        assert_eq!(cli.command, Commands::Summarize { batch_size: 5 });
        assert!(cli.verbose);

        assert!(Cli::try_parse_from(["ai-news"]).is_err());
        assert!(Cli::try_parse_from(["ai-news", "publish"]).is_err());
    }

    #[test]
    fn test_format_status() {
        let stats = DatabaseStats {
            article_count: 42,
            briefing_count: 3,
            ..DatabaseStats::default()
        };
        let statuses = vec![
            SourceStatus {
                source_name: "arxiv".to_string(),
                last_run: Some(Utc.with_ymd_and_hms(2026, 10, 16, 6, 5, 0).unwrap()),
                last_success: None,
                status: SourceState::Error,
                error_message: Some("HTTP 503".to_string()),
                articles_fetched: 0,
                total_articles: 17,
            },
            SourceStatus {
                source_name: "github".to_string(),
                last_run: None,
                last_success: None,
                status: SourceState::Idle,
                error_message: None,
                articles_fetched: 0,
                total_articles: 0,
            },
        ];

        let report = format_status(&stats, &statuses);
        assert!(report.contains("Total articles: 42\n"));
        assert!(report.contains("Total briefings: 3\n"));
        assert!(report.contains(&format!("{:<20} {:<10} {:<20} {:<8}", "arxiv", "error", "2026-10-16 06:05", 17)));
        assert!(report.contains(&format!("{:<20} {:<10} {:<20} {:<8}", "github", "idle", "—", 0)));
    }

    #[tokio::test]
    async fn test_push_fails_when_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.paths.site_dir = dir.path().join("site");
        let db = crate::database::NewsDatabase::new_in_memory().await.unwrap();
        let handler = CliHandler::with_context(AppContext::new(config, Arc::new(db), None));

        assert!(handler.handle_command(Commands::Push).await.is_err());
        handler.handle_command(Commands::Status).await.unwrap();
    }
}
