use ai_news_aggregator::cli::{Cli, CliHandler};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Targets that are too chatty at debug level
const QUIET_TARGETS: &[&str] = &["hyper", "reqwest", "sqlx", "h2", "rustls", "html5ever"];

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        QUIET_TARGETS
            .iter()
            .fold(EnvFilter::new(level), |filter, target| match format!("{}=warn", target).parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            })
    });

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        tracing::debug!("Debug mode enabled - verbose logging active");
    }

    let handler = CliHandler::new(&cli.config).await?;
    handler.handle_command(cli.command).await
}
