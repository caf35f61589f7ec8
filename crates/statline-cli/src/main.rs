mod output;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use statline_client::HttpRetriever;
#[cfg(feature = "browser")]
use statline_client::BrowserRetriever;
use statline_core::config::{RetrieverConfig, RunnerConfig, parse_concurrency};
use statline_core::document::Document;
use statline_core::error::RetrievalError;
use statline_core::models::{HeaderProfile, Matchup};
use statline_core::runner::{EventDataRunner, MatchupRunner};
use statline_core::traits::{DocumentRetriever, EventDataScraper};
use statline_providers::basketball_reference::{
    BASE_URL, PlayerBoxScoreScraper, ScheduleScraper, TeamTotalsScraper,
};

use crate::output::{Format, write_records};

#[derive(Parser)]
#[command(name = "statline", version, about = "Sports statistics scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the games played on a date
    Matchups {
        #[command(flatten)]
        source: Source,
    },

    /// Scrape box scores for every game played on a date
    BoxScores {
        #[command(flatten)]
        source: Source,

        /// Which records to produce
        #[arg(long, value_enum, default_value_t = BoxFeed::Players)]
        feed: BoxFeed,

        /// Concurrent games in flight (0 = one per CPU, at most 256)
        #[arg(short, long, value_parser = parse_concurrency)]
        concurrency: Option<usize>,

        /// Give up on unfinished games after this many seconds
        #[arg(long)]
        run_timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(clap::Args)]
struct Source {
    /// Game date (YYYY-MM-DD)
    #[arg(short, long)]
    date: NaiveDate,

    /// Site root, for mirrors and local fixtures
    #[arg(long, env = "STATLINE_BASE_URL", default_value = BASE_URL)]
    base_url: String,

    /// Render pages in headless Chromium instead of plain HTTP
    #[arg(long, default_value_t = false)]
    browser: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BoxFeed {
    Players,
    Teams,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statline=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Matchups { source } => {
            let retriever = Retriever::connect(source.browser).await?;
            let matchups = discover(&retriever, &source).await?;
            write_records(std::io::stdout().lock(), &matchups, Format::Json)?;
        }
        Commands::BoxScores {
            source,
            feed,
            concurrency,
            run_timeout,
            format,
        } => {
            let mut config = RunnerConfig::from_env("box-scores")?;
            if let Some(concurrency) = concurrency {
                config = config.with_concurrency(concurrency);
            }
            if let Some(secs) = run_timeout {
                config = config.with_run_timeout(std::time::Duration::from_secs(secs));
            }

            let retriever = Retriever::connect(source.browser).await?;
            let matchups = discover(&retriever, &source).await?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling remaining games");
                    on_signal.cancel();
                }
            });

            match feed {
                BoxFeed::Players => {
                    let scraper = PlayerBoxScoreScraper::new(retriever);
                    run_feed(scraper, matchups, config, format, cancel).await?;
                }
                BoxFeed::Teams => {
                    let scraper = TeamTotalsScraper::new(retriever);
                    run_feed(scraper, matchups, config, format, cancel).await?;
                }
            }
        }
    }

    Ok(())
}

/// Runs the schedule scraper for the requested date.
async fn discover(retriever: &Retriever, source: &Source) -> Result<Vec<Matchup>> {
    let scraper =
        ScheduleScraper::new(retriever.clone(), source.date).with_base_url(source.base_url.as_str());
    let runner = MatchupRunner::new(scraper, RunnerConfig::from_env("matchups")?);
    runner
        .run()
        .await
        .with_context(|| format!("Failed to list games for {}", source.date))
}

/// Runs one event-data feed and writes whatever was collected.
///
/// Records gathered before a failure are still written; the run error is
/// returned afterwards so the process exits non-zero.
async fn run_feed<S>(
    scraper: S,
    matchups: Vec<Matchup>,
    config: RunnerConfig,
    format: Format,
    cancel: CancellationToken,
) -> Result<()>
where
    S: EventDataScraper<Unit = Matchup>,
    S::Record: Serialize,
{
    if matchups.is_empty() {
        tracing::info!("No games scheduled");
    }

    let runner = EventDataRunner::new(scraper, config);
    let outcome = runner.run_until(matchups, cancel).await;

    write_records(std::io::stdout().lock(), &outcome.records, format)?;

    match outcome.error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// The retriever picked on the command line.
#[derive(Clone)]
enum Retriever {
    Http(HttpRetriever),
    #[cfg(feature = "browser")]
    Browser(BrowserRetriever),
}

impl Retriever {
    async fn connect(browser: bool) -> Result<Self> {
        let config = RetrieverConfig::from_env()?;

        if browser {
            #[cfg(feature = "browser")]
            {
                let retriever = BrowserRetriever::launch(config)
                    .await
                    .context("Failed to launch headless browser")?;
                return Ok(Self::Browser(retriever));
            }
            #[cfg(not(feature = "browser"))]
            anyhow::bail!("--browser requires statline to be built with the `browser` feature");
        }

        let retriever = HttpRetriever::with_config(config).context("Failed to create HTTP client")?;
        Ok(Self::Http(retriever))
    }
}

impl DocumentRetriever for Retriever {
    async fn retrieve(
        &self,
        url: &str,
        headers: &HeaderProfile,
        ready_selector: &str,
    ) -> Result<Document, RetrievalError> {
        match self {
            Self::Http(inner) => inner.retrieve(url, headers, ready_selector).await,
            #[cfg(feature = "browser")]
            Self::Browser(inner) => inner.retrieve(url, headers, ready_selector).await,
        }
    }
}
