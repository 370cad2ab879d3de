mod config;
mod paging;
mod providers;
mod report;
mod service;
mod vcs;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat, LoggingConfig};
use crate::paging::{PageRequest, DEFAULT_LIMIT};
use crate::report::Report;
use crate::service::MetricsService;
use crate::vcs::{StateFilter, TimeWindow};

/// devmetrics: repository, commit and pull request metrics from GitHub and GitLab.
#[derive(Parser, Debug)]
#[command(name = "devmetrics", version, about)]
struct Cli {
    /// Configuration file (defaults to .devmetrics.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of terminal text
    #[arg(long, global = true)]
    json: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show repository metadata
    Repo {
        /// Provider identifier: github, gitlab or bitbucket
        provider: String,
        /// `owner/name`, a GitLab namespace path, or a numeric project id
        repo: String,
    },
    /// Check whether a repository exists
    Exists { provider: String, repo: String },
    /// List commits in a time window
    Commits {
        provider: String,
        repo: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// List pull (merge) requests created in a time window
    Pulls {
        provider: String,
        repo: String,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, value_enum, default_value_t = StateFilter::All)]
        state: StateFilter,
    },
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Window start, RFC 3339 (defaults to `request.window_days` before --until)
    #[arg(long)]
    since: Option<DateTime<Utc>>,

    /// Window end, RFC 3339 (defaults to now)
    #[arg(long)]
    until: Option<DateTime<Utc>>,

    /// Zero-based index of the first item
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Page size; values <= 0 fall back to the default
    #[arg(long, default_value_t = i64::from(DEFAULT_LIMIT), allow_negative_numbers = true)]
    limit: i64,

    /// Walk every page instead of returning one
    #[arg(long)]
    all: bool,
}

impl RangeArgs {
    fn window(&self, config: &Config) -> Result<TimeWindow, vcs::VcsError> {
        TimeWindow::resolve(self.since, self.until, Utc::now(), config.request.window_days)
    }

    fn request(&self) -> PageRequest {
        PageRequest::new(self.offset, self.limit)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    let registry = providers::Registry::from_config(&config);
    if registry.kinds().is_empty() {
        warn!(
            unavailable = registry.unavailable().len(),
            "no providers registered; enable one in the config file or environment"
        );
    }
    let service = MetricsService::new(registry, config.request.timeout());

    let built_report = run(&service, &config, cli.command).await?;
    info!(items = built_report.item_count(), "generating report");
    report::output(&built_report, cli.json, cli.output.as_deref())?;
    info!("done");

    Ok(())
}

/// RUST_LOG wins over the configured level. Logs always go to stderr.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(
    service: &MetricsService,
    config: &Config,
    command: Command,
) -> Result<Report, vcs::VcsError> {
    match command {
        Command::Repo { provider, repo } => {
            info!(provider = %provider, repo = %repo, "fetching repository");
            let repository = service.repository(&provider, &repo).await?;
            Ok(Report::Repository {
                provider,
                repository,
            })
        }
        Command::Exists { provider, repo } => {
            let exists = service.exists(&provider, &repo).await?;
            Ok(Report::Exists {
                provider,
                repo,
                exists,
            })
        }
        Command::Commits {
            provider,
            repo,
            range,
        } => {
            let window = range.window(config)?;
            info!(provider = %provider, repo = %repo, since = %window.since(), until = %window.until(), all = range.all, "fetching commits");
            if range.all {
                let items = service.all_commits(&provider, &repo, &window).await?;
                Ok(Report::Commits {
                    provider,
                    repo,
                    items,
                    pagination: None,
                })
            } else {
                let page = service
                    .commits(&provider, &repo, &window, range.request())
                    .await?;
                Ok(Report::commits_page(&provider, &repo, page))
            }
        }
        Command::Pulls {
            provider,
            repo,
            range,
            state,
        } => {
            let window = range.window(config)?;
            info!(provider = %provider, repo = %repo, state = ?state, all = range.all, "fetching pull requests");
            if range.all {
                let items = service
                    .all_pull_requests(&provider, &repo, &window, state)
                    .await?;
                Ok(Report::PullRequests {
                    provider,
                    repo,
                    items,
                    pagination: None,
                })
            } else {
                let page = service
                    .pull_requests(&provider, &repo, &window, state, range.request())
                    .await?;
                Ok(Report::pull_requests_page(&provider, &repo, page))
            }
        }
    }
}
