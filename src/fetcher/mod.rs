pub mod browser;
pub mod http;
pub mod user_agent;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub use browser::{BrowserSession, ChromeLauncher, RenderedFetcher, SessionGuard, SessionLauncher};
pub use http::StaticFetcher;
pub use user_agent::UserAgentPool;

use crate::config::AppConfig;
use crate::models::{FetchStrategy, FetchTarget, FetchedPage};
use crate::{AppError, Result};

/// One way of obtaining a page's content.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    fn strategy(&self) -> FetchStrategy;
    async fn fetch(&self, target: &FetchTarget) -> Result<FetchedPage>;
}

/// Dispatches to the backend registered for the requested strategy. There is
/// no implicit fallback: a static fetch that fails stays failed.
#[derive(Default)]
pub struct PageFetcher {
    backends: Vec<Box<dyn FetchBackend>>,
}

impl PageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static and rendered backends built from configuration. Chrome is only
    /// launched when a rendered fetch actually runs.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let user_agents = UserAgentPool::new(config.scraper.user_agents.clone());
        let launcher = ChromeLauncher::new(config.scraper.chrome_path.as_ref().map(PathBuf::from));

        let fetcher = Self::new()
            .with_backend(StaticFetcher::new(
                config.target.request_timeout(),
                user_agents.clone(),
            )?)
            .with_backend(RenderedFetcher::new(
                Arc::new(launcher),
                user_agents,
                config.target.navigation_timeout(),
                config.target.render_timeout(),
            ));

        Ok(fetcher)
    }

    /// Registers a backend, replacing any existing one for the same strategy.
    pub fn with_backend<B: FetchBackend + 'static>(mut self, backend: B) -> Self {
        self.register(Box::new(backend));
        self
    }

    pub fn register(&mut self, backend: Box<dyn FetchBackend>) {
        self.backends.retain(|b| b.strategy() != backend.strategy());
        self.backends.push(backend);
    }

    pub fn strategies(&self) -> Vec<FetchStrategy> {
        self.backends.iter().map(|b| b.strategy()).collect()
    }

    pub async fn fetch(&self, target: &FetchTarget, strategy: FetchStrategy) -> Result<FetchedPage> {
        let backend = self
            .backends
            .iter()
            .find(|b| b.strategy() == strategy)
            .ok_or_else(|| {
                AppError::Config(config::ConfigError::Message(format!(
                    "No fetch backend registered for strategy '{}'",
                    strategy
                )))
            })?;

        info!(url = %target.url, %strategy, "Fetching target page");
        let page = backend.fetch(target).await?;
        info!(
            url = %page.final_url,
            %strategy,
            elapsed_ms = page.elapsed_ms,
            bytes = page.content.len(),
            "Fetched target page"
        );

        Ok(page)
    }
}
