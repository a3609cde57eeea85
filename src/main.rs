use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use gold_rate_watcher::chart::{ChartRenderer, TrendRenderer};
use gold_rate_watcher::config::LoggingConfig;
use gold_rate_watcher::history::{CsvHistoryStore, HistoryStore};
use gold_rate_watcher::plugins::notifiers::{LogNotifier, TelegramNotifier};
use gold_rate_watcher::plugins::Notifier;
use gold_rate_watcher::{AppConfig, FetchStrategy, RateWatcher};

#[derive(Debug, Parser)]
#[command(name = "gold-rate-watcher", version, about = "Fetch today's gold rate and post it to Telegram")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured fetch strategy
    #[arg(short, long, value_enum)]
    strategy: Option<FetchStrategy>,

    /// Log messages instead of sending them to Telegram
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, record and notify once (default)
    Run,
    /// Print the recorded price history
    History,
    /// Re-render the trend chart from recorded history
    Chart,
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .with_context(|| format!("invalid log filter '{}'", config.filter))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "gold-rate-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run_once(config: &AppConfig, dry_run: bool) -> Result<()> {
    let notifier: Box<dyn Notifier> = if dry_run {
        Box::new(LogNotifier)
    } else {
        Box::new(TelegramNotifier::from_config(&config.notifier)?)
    };

    let watcher = RateWatcher::from_config(config, notifier)?;
    let today = chrono::Local::now().date_naive();
    let report = watcher.run(today).await;

    if !report.is_success() {
        warn!(outcome = ?report.outcome, "Run finished without a price");
    }
    Ok(())
}

fn print_history(config: &AppConfig) -> Result<()> {
    let series = CsvHistoryStore::new(config.history.path.clone()).load()?;
    if series.is_empty() {
        println!("No prices recorded yet in {}", config.history.path.display());
        return Ok(());
    }

    for observation in &series {
        println!("{}  {}", observation.date, observation.price);
    }
    Ok(())
}

fn render_chart(config: &AppConfig) -> Result<()> {
    let series = CsvHistoryStore::new(config.history.path.clone()).load()?;
    let renderer = ChartRenderer::new(config.history.chart_path.clone())
        .with_font(config.history.chart_font.clone());

    match renderer.render(&series)? {
        Some(path) => println!("Chart written to {}", path.display()),
        None => println!("Need at least two recorded prices to draw a chart"),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(strategy) = cli.strategy {
        config.target.strategy = strategy;
    }

    let _guard = init_tracing(&config.logging)?;

    let command = cli.command.unwrap_or(Command::Run);
    match command {
        Command::Run => {
            config
                .validate_for(cli.dry_run)
                .context("invalid configuration")?;
            info!(strategy = %config.target.strategy, dry_run = cli.dry_run, "Starting Gold Rate Watcher");
            run_once(&config, cli.dry_run).await
        }
        Command::History => print_history(&config),
        Command::Chart => render_chart(&config),
    }
}
