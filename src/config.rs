use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::models::{FetchStrategy, FetchTarget, SelectorSpec};

pub const DEFAULT_TARGET_URL: &str = "https://www.livechennai.com/gold_silverrate.asp";
pub const DEFAULT_SELECTOR: &str = "table.today-gold-rate tbody tr td";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub url: String,
    pub selector: String,
    pub selector_index: usize,
    pub strategy: FetchStrategy,
    pub request_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub render_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TARGET_URL.to_string(),
            selector: DEFAULT_SELECTOR.to_string(),
            // second cell of the first row
            selector_index: 1,
            strategy: FetchStrategy::Static,
            request_timeout_secs: 15,
            navigation_timeout_secs: 30,
            render_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agents: Vec<String>,
    pub chrome_path: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agents: crate::fetcher::user_agent::DEFAULT_USER_AGENTS
                .iter()
                .map(|ua| ua.to_string())
                .collect(),
            chrome_path: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Telegram chat id
    pub destination: String,
    pub token: String,
    pub api_base: String,
    pub chart_caption: String,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            destination: String::new(),
            token: String::new(),
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            chart_caption: "Gold Price History (₹ per 1g, 22K)".to_string(),
            timeout_secs: 10,
        }
    }
}

// Keeps the bot token out of debug logs.
impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("destination", &self.destination)
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("api_base", &self.api_base)
            .field("chart_caption", &self.chart_caption)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
    pub chart_path: PathBuf,
    /// TTF/OTF font for chart labels; common system fonts are tried otherwise.
    pub chart_font: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/gold_prices.csv"),
            chart_path: PathBuf::from("data/gold_price_history.png"),
            chart_font: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "gold_rate_watcher=info".to_string(),
            directory: None,
        }
    }
}

impl TargetConfig {
    pub fn selector_spec(&self) -> SelectorSpec {
        SelectorSpec::new(self.selector.clone(), self.selector_index)
    }

    pub fn fetch_target(&self) -> FetchTarget {
        FetchTarget::new(self.url.clone(), self.selector_spec())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

impl AppConfig {
    /// Layered load: config file (explicit path, or `config/default`),
    /// `config/local`, then `GOLDRATE_`-prefixed environment variables
    /// (`GOLDRATE_NOTIFIER__TOKEN`, ...). Legacy variable names
    /// are honoured last for anything still unset.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = match path {
            Some(path) => Config::builder().add_source(File::from(path)),
            None => Config::builder().add_source(File::with_name("config/default").required(false)),
        };

        let s = builder
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("GOLDRATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Fill unset values from `TELEGRAM_TOKEN`/`TELEGRAM_BOT_TOKEN`,
    /// `CHAT_ID`/`TELEGRAM_CHAT_ID` and `CHROME_PATH`.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_set = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .find(|value| !value.trim().is_empty())
        };

        if self.notifier.token.is_empty() {
            if let Some(token) = first_set(&["TELEGRAM_TOKEN", "TELEGRAM_BOT_TOKEN"]) {
                self.notifier.token = token;
            }
        }

        if self.notifier.destination.is_empty() {
            if let Some(chat_id) = first_set(&["CHAT_ID", "TELEGRAM_CHAT_ID"]) {
                self.notifier.destination = chat_id;
            }
        }

        if self.scraper.chrome_path.is_none() {
            self.scraper.chrome_path = first_set(&["CHROME_PATH"]);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for(false)
    }

    /// Dry runs log instead of delivering, so they need no credentials.
    pub fn validate_for(&self, dry_run: bool) -> Result<(), ConfigError> {
        match Url::parse(&self.target.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(_) => return Err(ConfigError::Message("Target URL must use http or https".into())),
            Err(_) => return Err(ConfigError::Message("Invalid target URL format".into())),
        }

        if let Err(e) = scraper::Selector::parse(&self.target.selector) {
            return Err(ConfigError::Message(format!(
                "Invalid target selector '{}': {:?}",
                self.target.selector, e
            )));
        }

        if self.target.request_timeout_secs == 0
            || self.target.navigation_timeout_secs == 0
            || self.target.render_timeout_secs == 0
        {
            return Err(ConfigError::Message("Target timeouts must be greater than 0".into()));
        }

        if self.notifier.timeout_secs == 0 {
            return Err(ConfigError::Message("Notifier timeout must be greater than 0".into()));
        }

        if !dry_run {
            if self.notifier.destination.trim().is_empty() {
                return Err(ConfigError::Message("Notifier destination (chat id) is required".into()));
            }

            if self.notifier.token.trim().is_empty() {
                return Err(ConfigError::Message("Notifier token is required".into()));
            }

            if Url::parse(&self.notifier.api_base).is_err() {
                return Err(ConfigError::Message("Invalid notifier api_base URL".into()));
            }
        }

        if self.history.path.as_os_str().is_empty() {
            return Err(ConfigError::Message("History path must not be empty".into()));
        }

        Ok(())
    }
}
