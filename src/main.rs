use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod ai;
mod config;
mod db;
mod error;
mod models;
mod output;
mod pipeline;
mod selection;
mod sources;
#[cfg(test)]
mod testing;

use ai::{create_backend, BackendKind};
use config::Config;
use db::{ArticleStore, Repository};
use error::{AppError, Result};
use pipeline::{Curator, CuratorConfig, RunSummary};
use selection::select_daily;
use sources::WebSource;

/// Pool size for the daily selection when nothing was scored today.
const DAILY_FALLBACK_POOL: usize = 100;

const EXPORT_DIR: &str = "output";

/// Curates daily news for Samfundsfag A with a two-pass AI relevance assessment.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long, global = true, env = "SAMFKURATOR_CONFIG")]
    config: Option<PathBuf>,

    // `daily` when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, skim, score and store today's headlines
    Run(RunArgs),

    /// Print a short, diverse selection of the best articles
    Daily {
        #[command(flatten)]
        run: RunArgs,

        /// Number of articles to select
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Select from stored scores without a new run
        #[arg(long)]
        cached: bool,
    },

    /// List stored scored articles or export them as JSON or CSV
    All {
        /// Lowest score to include (defaults to scoring.min_score)
        #[arg(long)]
        min_score: Option<u8>,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Export file (defaults to a timestamped file in ./output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Daily {
            run: RunArgs::default(),
            count: None,
            cached: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
    Csv,
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Scoring backend: gemini, deepseek, claude, ollama (or local)
    #[arg(short, long)]
    backend: Option<String>,

    /// Start immediately instead of after the configured random delay
    #[arg(long)]
    no_jitter: bool,

    /// Cancel the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("samfkurator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Aborted");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or_default() {
        Command::Run(args) => {
            let store = Arc::new(Repository::new(&config.db_path).await?);
            let summary = curate(&config, &args, store).await?;
            println!("{}", output::render_run_summary(&summary));
        }
        Command::Daily { run, count, cached } => {
            let store = Arc::new(Repository::new(&config.db_path).await?);
            if !cached {
                let summary = curate(&config, &run, store.clone()).await?;
                println!("{}\n", output::render_run_summary(&summary));
            }

            let mut daily = config.daily.clone();
            if let Some(count) = count {
                daily.count = count;
            }

            let min_score = config.scoring.min_score;
            let mut rows = store.todays_scored_articles(min_score).await?;
            if rows.is_empty() {
                info!("Nothing scored today; selecting from the best stored articles");
                rows = store.scored_articles(min_score, DAILY_FALLBACK_POOL).await?;
            }

            let picked = select_daily(&rows, &daily);
            println!("{}", output::render_daily(&picked));
        }
        Command::All {
            min_score,
            limit,
            format,
            output: target,
        } => {
            let store = Repository::new(&config.db_path).await?;
            let rows = store
                .scored_articles(min_score.unwrap_or(config.scoring.min_score), limit)
                .await?;

            let export = |extension: &str| {
                target
                    .clone()
                    .unwrap_or_else(|| output::export_path(Path::new(EXPORT_DIR), extension))
            };
            let path = match format {
                OutputFormat::Terminal => {
                    println!("{}", output::render_listing(&rows));
                    return Ok(());
                }
                OutputFormat::Json => {
                    let path = export("json");
                    output::write_json(&path, &rows)?;
                    path
                }
                OutputFormat::Csv => {
                    let path = export("csv");
                    output::write_csv(&path, &rows)?;
                    path
                }
            };
            println!("Exported {} articles to {}", rows.len(), path.display());
        }
    }

    Ok(())
}

/// One curation run with the configured sites, appended to the run log.
async fn curate(config: &Config, args: &RunArgs, store: Arc<Repository>) -> Result<RunSummary> {
    let kind: BackendKind = args
        .backend
        .as_deref()
        .unwrap_or(&config.ai.backend)
        .parse()?;
    let timeout = config.pacing.request_timeout();

    let backend = create_backend(kind, &config.ai, timeout)?;
    if backend.capabilities().preflight && !backend.is_available().await {
        return Err(AppError::BackendUnavailable(backend.name()));
    }

    let source = Arc::new(WebSource::new(timeout)?);
    let curator = Curator::new(
        backend,
        source,
        store,
        CuratorConfig::from_config(config, args.no_jitter),
    );

    let cancel = CancellationToken::new();
    watch_for_cancel(&cancel, args.timeout_secs.map(Duration::from_secs));

    let summary = curator.run(&config.sites, &cancel).await;
    cancel.cancel();

    if let Err(e) = output::append_run_log(Path::new(&config.run_log_path), &summary) {
        warn!(path = %config.run_log_path, error = %e, "Failed to append run log");
    }
    Ok(summary)
}

/// Cancel on Ctrl-C or after `timeout`, whichever comes first.
fn watch_for_cancel(cancel: &CancellationToken, timeout: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; stopping after the current article");
                token.cancel();
            }
            _ = deadline => {
                warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Run timed out");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}
