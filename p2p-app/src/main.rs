mod render;
mod source;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use p2p_config::{ConfigManager, MonitorSettings};
use p2p_core::DateRange;
use p2p_trend::QuoteAnalyzer;
use render::TextReport;
use source::CsvSource;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{signal, time::MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Trend monitor for P2P fiat/stablecoin quotes", long_about = None)]
struct Args {
    /// Path to configuration file (defaults to ./config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV file with collected quotes
    #[arg(short, long, env = "P2P_MONITOR_INPUT")]
    input: Option<PathBuf>,

    /// First local date to show (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last local date to show (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Maximum number of table rows in text output
    #[arg(short, long)]
    limit: Option<usize>,

    /// Keep running and refresh on an interval
    #[arg(short, long)]
    watch: bool,

    /// Refresh interval in seconds for watch mode
    #[arg(long)]
    interval: Option<u64>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.debug);

    let mut settings = load_settings(args.config.as_deref())?;
    apply_overrides(&mut settings, &args);
    settings
        .validate()
        .context("Invalid configuration")?;

    if args.print_config {
        print!("{}", serde_yaml::to_string(&settings)?);
        return Ok(());
    }

    let analyzer = QuoteAnalyzer::new(settings.analysis.clone())?;
    let source = CsvSource::new(&settings.source.path);

    info!(
        "Reading quotes from {} (canonical zone {}, windows {:?})",
        source.path().display(),
        analyzer.zone(),
        analyzer.config().windows
    );

    if !args.watch {
        return refresh(&analyzer, &source, &args).await;
    }

    let period = Duration::from_secs(settings.source.refresh_seconds);
    info!("Watching, refresh every {}s", period.as_secs());

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = refresh(&analyzer, &source, &args).await {
                    error!("Refresh failed: {:#}", e);
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let env_filter = if debug { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<MonitorSettings> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => ConfigManager::new()?,
        None => ConfigManager::from_env()?,
    };

    Ok(manager.into_settings())
}

fn apply_overrides(settings: &mut MonitorSettings, args: &Args) {
    if let Some(input) = &args.input {
        settings.source.path = input.clone();
    }

    if let Some(interval) = args.interval {
        settings.source.refresh_seconds = interval;
    }

    if args.from.is_some() || args.to.is_some() {
        let current = settings.analysis.date_range;
        let start = args
            .from
            .or(current.map(|r| r.start))
            .unwrap_or(NaiveDate::MIN);
        let end = args.to.or(current.map(|r| r.end)).unwrap_or(NaiveDate::MAX);
        settings.analysis.date_range = Some(DateRange::new(start, end));
    }
}

async fn refresh(analyzer: &QuoteAnalyzer, source: &CsvSource, args: &Args) -> Result<()> {
    let rows = source.load().await?;
    let report = analyzer
        .analyze(&rows)
        .with_context(|| format!("Failed to analyze {}", source.path().display()))?;

    match args.format {
        OutputFormat::Text => {
            println!(
                "{}",
                TextReport::new(&report, analyzer.zone()).with_limit(args.limit)
            );
        }
        OutputFormat::Json => println!("{}", report.to_json_pretty()?),
    }

    Ok(())
}
