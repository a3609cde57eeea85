use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use super::user_agent::UserAgentPool;
use super::FetchBackend;
use crate::models::{FetchStrategy, FetchTarget, FetchedPage};
use crate::{AppError, Result};

/// Plain GET for pages that ship the price in their initial HTML.
pub struct StaticFetcher {
    client: Client,
    user_agents: UserAgentPool,
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-IN,en;q=0.9"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

fn transport_error(url: &str, err: &reqwest::Error) -> AppError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if let Some(status) = err.status() {
        format!("HTTP status {}", status)
    } else {
        err.to_string()
    };

    AppError::Transport { url: url.to_string(), message }
}

impl StaticFetcher {
    pub fn new(timeout: Duration, user_agents: UserAgentPool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(browser_headers())
            .build()?;

        Ok(Self { client, user_agents })
    }
}

#[async_trait]
impl FetchBackend for StaticFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Static
    }

    async fn fetch(&self, target: &FetchTarget) -> Result<FetchedPage> {
        let start_time = Instant::now();
        let user_agent = self.user_agents.pick();
        debug!(url = %target.url, user_agent, "GET target page");

        let response = self
            .client
            .get(&target.url)
            .header(header::USER_AGENT, user_agent)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| transport_error(&target.url, &e))?;

        let final_url = response.url().to_string();
        let content = response
            .text()
            .await
            .map_err(|e| transport_error(&target.url, &e))?;

        Ok(FetchedPage {
            content,
            strategy: FetchStrategy::Static,
            final_url,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}
