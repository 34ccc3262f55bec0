//! Git Delivery Analytics Tool
//!
//! Analyzes the commits of a date range in a local repository and prints the
//! aggregate summary and the analytics report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gitpulse::analysis::{AnalyticsEngine, CommitAggregator, CommitSource, GitSource};
use gitpulse::{AnalyticsConfig, DateInput, DateParser};

#[derive(Debug, Parser)]
#[command(name = "gitpulse", version, about = "Delivery analytics for a git history")]
struct Cli {
    /// Path to the repository
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Branch to walk instead of HEAD
    #[arg(long)]
    branch: Option<String>,

    /// Range start: "now", a relative offset such as "2w", or "YYYY-MM-DD[ HH:MM]"
    #[arg(long)]
    since: Option<String>,

    /// Range end, same forms as --since (defaults to the end of today)
    #[arg(long)]
    until: Option<String>,

    /// JSON config file; defaults to the user config file when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on the commit walk after this many seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalyticsConfig> {
    if let Some(path) = path {
        return AnalyticsConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    match AnalyticsConfig::default_path() {
        Some(path) if path.exists() => {
            debug!("using config file {}", path.display());
            AnalyticsConfig::load(&path).with_context(|| format!("loading {}", path.display()))
        }
        _ => Ok(AnalyticsConfig::default()),
    }
}

/// Log filter used when `RUST_LOG` is unset.
fn default_log_filter() -> &'static str {
    if cfg!(feature = "dev") {
        "debug"
    } else {
        "warn"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_log_filter())).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let range = DateParser::new()
        .validate_date_range(
            cli.since.map(DateInput::from),
            cli.until.map(DateInput::from),
        )
        .context("invalid date range")?;
    info!("analyzing {} from {} to {}", cli.repo.display(), range.start, range.end);

    let mut source = GitSource::open(&cli.repo)
        .with_context(|| format!("opening repository {}", cli.repo.display()))?;
    if let Some(branch) = cli.branch {
        source = source.with_branch(branch);
    }
    let source: Arc<dyn CommitSource> = Arc::new(source);

    let aggregate = CommitAggregator::new()
        .aggregate_with_timeout(range, source, Duration::from_secs(cli.timeout_secs))
        .await?;
    let aggregate = Arc::new(aggregate);

    let engine = AnalyticsEngine::new(&config);
    let report = engine.analyze(Arc::clone(&aggregate)).await;

    let output = json!({
        "range": range,
        "summary": {
            "total_commits": aggregate.total_commits(),
            "skipped_commits": aggregate.skipped_commits,
            "authors": aggregate.authors.len(),
            "totals": aggregate.totals,
            "average_commit_size": aggregate.average_commit_size(),
            "top_contributors": aggregate.top_contributors(10),
        },
        "report": &*report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
