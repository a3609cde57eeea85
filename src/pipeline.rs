use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::chart::{ChartRenderer, TrendRenderer};
use crate::config::AppConfig;
use crate::fetcher::PageFetcher;
use crate::history::{CsvHistoryStore, HistoryStore};
use crate::models::{FetchStrategy, FetchTarget, Observation, Series};
use crate::plugins::Notifier;
use crate::price_extractor::{PriceExtractor, CURRENCY_SYMBOL};
use crate::utils::error::FailureClass;
use crate::{AppError, Result};

/// What a run needs to know, resolved from configuration up front.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub target: FetchTarget,
    pub strategy: FetchStrategy,
    /// Notifier destination (Telegram chat id)
    pub destination: String,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            target: config.target.fetch_target(),
            strategy: config.target.strategy,
            destination: config.notifier.destination.clone(),
        }
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success {
        price: Decimal,
        previous: Option<Observation>,
    },
    Failure {
        reason: String,
        class: FailureClass,
    },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub persisted: bool,
    pub chart: Option<PathBuf>,
    pub text_delivered: bool,
    /// `None` when there was no chart to send.
    pub image_delivered: Option<bool>,
    pub total_time_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success { .. })
    }
}

/// One pass of fetch → extract → persist → render → notify.
pub struct RateWatcher {
    settings: RunSettings,
    fetcher: PageFetcher,
    extractor: PriceExtractor,
    history: Box<dyn HistoryStore>,
    renderer: Box<dyn TrendRenderer>,
    notifier: Box<dyn Notifier>,
}

impl RateWatcher {
    pub fn new(
        settings: RunSettings,
        fetcher: PageFetcher,
        extractor: PriceExtractor,
        history: Box<dyn HistoryStore>,
        renderer: Box<dyn TrendRenderer>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            extractor,
            history,
            renderer,
            notifier,
        }
    }

    /// Production wiring: HTTP/Chrome fetchers, CSV history, PNG chart.
    pub fn from_config(config: &AppConfig, notifier: Box<dyn Notifier>) -> Result<Self> {
        Ok(Self::new(
            RunSettings::from_config(config),
            PageFetcher::from_config(config)?,
            PriceExtractor::new(),
            Box::new(CsvHistoryStore::new(config.history.path.clone())),
            Box::new(
                ChartRenderer::new(config.history.chart_path.clone())
                    .with_font(config.history.chart_font.clone()),
            ),
            notifier,
        ))
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Never fails: every problem ends up either in the delivered message or
    /// in the logs.
    pub async fn run(&self, today: NaiveDate) -> RunReport {
        let start_time = Instant::now();
        info!(
            url = %self.settings.target.url,
            strategy = %self.settings.strategy,
            %today,
            "Starting gold rate check"
        );

        let price = match self.acquire_price().await {
            Ok(price) => price,
            Err(e) => {
                let class = e.failure_class();
                warn!(error = %e, ?class, "Could not determine today's gold rate");

                let text_delivered = self.deliver_text(&failure_message(&e)).await;
                return RunReport {
                    outcome: RunOutcome::Failure {
                        reason: e.to_string(),
                        class,
                    },
                    persisted: false,
                    chart: None,
                    text_delivered,
                    image_delivered: None,
                    total_time_ms: start_time.elapsed().as_millis() as u64,
                };
            }
        };
        info!(%price, "Extracted today's gold rate");

        let observation = Observation::new(today, price);
        let persisted = match self.history.append(&observation) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to record today's rate, continuing with notification");
                false
            }
        };

        let series = self.updated_series(&observation, persisted);
        let previous = series.previous_before(today).cloned();
        let chart = self.render_trend(&series);

        let text_delivered = self
            .deliver_text(&success_message(price, previous.as_ref()))
            .await;
        let image_delivered = match &chart {
            Some(path) => Some(self.deliver_image(path).await),
            None => None,
        };

        let report = RunReport {
            outcome: RunOutcome::Success { price, previous },
            persisted,
            chart,
            text_delivered,
            image_delivered,
            total_time_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            persisted = report.persisted,
            chart = report.chart.is_some(),
            text_delivered = report.text_delivered,
            total_time_ms = report.total_time_ms,
            "Gold rate check finished"
        );
        report
    }

    async fn acquire_price(&self) -> Result<Decimal> {
        let page = self
            .fetcher
            .fetch(&self.settings.target, self.settings.strategy)
            .await?;
        self.extractor.extract(&page.content, &self.settings.target.selector)
    }

    /// Stored history with today's observation guaranteed to be last, even
    /// when the append or the reload failed.
    fn updated_series(&self, observation: &Observation, persisted: bool) -> Series {
        let (mut series, reloaded) = match self.history.load() {
            Ok(series) => (series, true),
            Err(e) => {
                warn!(error = %e, "Could not reload history, charting today's rate only");
                (Series::new(), false)
            }
        };

        if !persisted || !reloaded {
            series.push(observation.clone());
        }
        series
    }

    fn render_trend(&self, series: &Series) -> Option<PathBuf> {
        if series.len() < 2 {
            info!(points = series.len(), "Not enough history for a trend chart yet");
            return None;
        }

        match self.renderer.render(series) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Trend chart could not be rendered");
                None
            }
        }
    }

    async fn deliver_text(&self, text: &str) -> bool {
        debug!(%text, "Sending message");
        match self.notifier.send_text(&self.settings.destination, text).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to deliver message");
                false
            }
        }
    }

    async fn deliver_image(&self, path: &Path) -> bool {
        match self.notifier.send_image(&self.settings.destination, path).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to deliver trend chart");
                false
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `₹ 10,190`, or `₹ 6,950.50` when there are paise.
pub fn format_rupees(amount: Decimal) -> String {
    let amount = amount.abs().round_dp(2);
    let whole = group_thousands(&amount.trunc().normalize().to_string());

    if amount.fract().is_zero() {
        format!("{} {}", CURRENCY_SYMBOL, whole)
    } else {
        let fraction = format!("{:.2}", amount.fract());
        format!("{} {}{}", CURRENCY_SYMBOL, whole, fraction.trim_start_matches('0'))
    }
}

pub fn success_message(price: Decimal, previous: Option<&Observation>) -> String {
    let mut message = format!(
        "💰 <b>Today's Gold Rate (22 KT, 1g)</b>\n{}",
        format_rupees(price)
    );

    if let Some(previous) = previous {
        let change = price - previous.price;
        let line = if change > Decimal::ZERO {
            format!("▲ {} since {}", format_rupees(change), previous.date)
        } else if change < Decimal::ZERO {
            format!("▼ {} since {}", format_rupees(change), previous.date)
        } else {
            format!("No change since {}", previous.date)
        };
        message.push('\n');
        message.push_str(&line);
    }

    message.push_str("\n\n(Automated daily update)");
    message
}

pub fn failure_message(err: &AppError) -> String {
    format!(
        "⚠️ Could not fetch today's gold rate: {}.\n<i>{}</i>",
        err.failure_class().describe(),
        escape_html(&err.to_string())
    )
}
