use chrono::Utc;
use clap::Parser;
use dataset_writer::CsvFileSink;
use harvest_service::{harvest_to_sink, HarvestOutcome, HarvestPlan, Harvester};
use karma_core::{AppConfig, CoreError, ErrorReporter};
use reddit_client::{ClientConfig, RedditApiClient, RequestPacer, TokioClock};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Collect aged self-posts from Reddit listings into a CSV dataset with
/// estimated vote counts.
#[derive(Parser, Debug)]
#[command(name = "karma-harvest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Global cap on collected posts
    #[arg(long)]
    max_total: Option<usize>,

    /// Only keep posts at least this many days old
    #[arg(long)]
    min_age_days: Option<u32>,

    /// Subreddit to collect (repeatable, replaces the configured list)
    #[arg(short, long = "subreddit")]
    subreddits: Vec<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(max_total) = self.max_total {
            config.max_total_posts = max_total;
        }
        if let Some(days) = self.min_age_days {
            config.min_age_days = days;
        }
        if !self.subreddits.is_empty() {
            config.subreddits = self.subreddits;
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "karma_harvest=debug,harvest_service=debug,reddit_client=debug,dataset_writer=debug,karma_core=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    run(cli).await.inspect_err(|e| ErrorReporter::new().report_error(e))
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let verbose = cli.verbose;
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!("Starting karma-harvest");

    let client = RedditApiClient::new(
        ClientConfig::new(config.user_agent.clone())
            .with_base_url(config.api_base_url.clone())
            .with_timeout(config.request_timeout()),
    )?;
    let pacer = RequestPacer::per_second(config.requests_per_second, TokioClock)?;
    let mut harvester = Harvester::new(client, pacer, HarvestPlan::from_config(&config));
    let mut sink = CsvFileSink::new(&config.output_path);

    let outcome = harvest_to_sink(&mut harvester, &mut sink, Utc::now()).await;

    let client = harvester.source();
    let metrics = client.get_metrics().await;
    tracing::info!(
        "Requests: {} total, {} failed, {} rate limited, avg {:?}",
        metrics.total_requests,
        metrics.failed_requests,
        metrics.rate_limited_requests,
        metrics.average_response_time()
    );
    for (subreddit, counts) in &metrics.requests_by_subreddit {
        tracing::info!(
            "  r/{}: {} requests, {:.0}% ok, avg {:?}, {} items",
            subreddit,
            counts.request_count,
            counts.success_rate() * 100.0,
            counts.average_response_time(),
            counts.items_received
        );
    }
    if verbose {
        tracing::debug!("Request metrics: {}", client.export_metrics().await?);
    }

    match outcome? {
        HarvestOutcome::Written { path, rows } => {
            tracing::info!("Saved {} rows to {}", rows, path.display());
        }
        HarvestOutcome::Empty => {
            tracing::warn!("No eligible posts were collected; no dataset written");
        }
    }

    Ok(())
}
