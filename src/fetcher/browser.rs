use async_trait::async_trait;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::user_agent::UserAgentPool;
use super::FetchBackend;
use crate::models::{FetchStrategy, FetchTarget, FetchedPage, SelectorSpec};
use crate::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One isolated browsing session, owned by a single fetch attempt.
pub trait BrowserSession: Send {
    /// Navigate and wait for the load to finish; returns the final URL.
    fn navigate(&mut self, url: &str, user_agent: &str) -> Result<String>;
    /// How many elements currently match `css`; zero is not an error.
    fn count_matches(&mut self, css: &str) -> Result<usize>;
    fn content(&mut self) -> Result<String>;
    /// Must be idempotent.
    fn release(&mut self);
}

pub trait SessionLauncher: Send + Sync {
    fn launch(&self, navigation_timeout: Duration) -> Result<Box<dyn BrowserSession>>;
}

/// Releases the wrapped session when dropped, whichever way the fetch exits.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.release();
    }
}

pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

impl SessionLauncher for ChromeLauncher {
    fn launch(&self, navigation_timeout: Duration) -> Result<Box<dyn BrowserSession>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::Driver(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.chrome_path {
            launch_options.path = Some(chrome_path.clone());
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Driver(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Driver(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(navigation_timeout);

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab: Some(tab),
        }))
    }
}

struct ChromeSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeSession {
    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| AppError::Driver("Browser session already released".to_string()))
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str, user_agent: &str) -> Result<String> {
        let tab = self.tab()?;

        tab.set_user_agent(user_agent, None, None)
            .map_err(|e| AppError::Driver(format!("Failed to set user agent: {}", e)))?;
        tab.navigate_to(url)
            .map_err(|e| AppError::Driver(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| AppError::Driver(format!("Page load failed: {}", e)))?;

        let final_url = tab.get_url();
        Ok(if final_url.is_empty() { url.to_string() } else { final_url })
    }

    fn count_matches(&mut self, css: &str) -> Result<usize> {
        match self.tab()?.find_elements(css) {
            Ok(elements) => Ok(elements.len()),
            Err(e) if e.is::<NoElementFound>() => Ok(0),
            Err(e) => Err(AppError::Driver(format!("Element lookup for '{}' failed: {}", css, e))),
        }
    }

    fn content(&mut self) -> Result<String> {
        self.tab()?
            .get_content()
            .map_err(|e| AppError::Driver(format!("Failed to get page content: {}", e)))
    }

    fn release(&mut self) {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close(true) {
                debug!(error = %e, "Tab close failed, dropping browser anyway");
            }
        }
        // Dropping the browser kills the Chrome process.
        self.browser.take();
    }
}

/// Polls until the `spec.index`-th match exists. Only running out of time is a
/// `RenderTimeout`; driver failures while polling stay `Driver` errors.
pub fn wait_for_match(
    session: &mut dyn BrowserSession,
    spec: &SelectorSpec,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;

    loop {
        let found = session.count_matches(&spec.css)?;
        if found > spec.index {
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            debug!(selector = %spec, found, "Gave up waiting for price element");
            return Err(AppError::RenderTimeout {
                selector: spec.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Launch, navigate, wait for the price element, read the rendered HTML.
pub fn render_page(
    launcher: &dyn SessionLauncher,
    target: &FetchTarget,
    user_agent: &str,
    navigation_timeout: Duration,
    render_timeout: Duration,
) -> Result<FetchedPage> {
    let start_time = Instant::now();
    let mut guard = SessionGuard::new(launcher.launch(navigation_timeout)?);
    let session = guard.session();

    let final_url = session.navigate(&target.url, user_agent)?;
    wait_for_match(session, &target.selector, render_timeout)?;
    let content = session.content()?;

    Ok(FetchedPage {
        content,
        strategy: FetchStrategy::Rendered,
        final_url,
        elapsed_ms: start_time.elapsed().as_millis() as u64,
    })
}

/// Headless Chrome fetch for pages that fill in the price client-side.
pub struct RenderedFetcher {
    launcher: Arc<dyn SessionLauncher>,
    user_agents: UserAgentPool,
    navigation_timeout: Duration,
    render_timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        user_agents: UserAgentPool,
        navigation_timeout: Duration,
        render_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            user_agents,
            navigation_timeout,
            render_timeout,
        }
    }

    /// Upper bound for the whole attempt, launch included.
    fn budget(&self) -> Duration {
        self.navigation_timeout + self.render_timeout + Duration::from_secs(5)
    }
}

#[async_trait]
impl FetchBackend for RenderedFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    async fn fetch(&self, target: &FetchTarget) -> Result<FetchedPage> {
        let launcher = Arc::clone(&self.launcher);
        let owned_target = target.clone();
        let user_agent = self.user_agents.pick().to_string();
        let (navigation_timeout, render_timeout) = (self.navigation_timeout, self.render_timeout);
        debug!(url = %target.url, user_agent = %user_agent, "Rendering target page");

        let task = tokio::task::spawn_blocking(move || {
            render_page(
                launcher.as_ref(),
                &owned_target,
                &user_agent,
                navigation_timeout,
                render_timeout,
            )
        });

        let budget = self.budget();
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AppError::Driver(format!("Browser task failed: {}", e))),
            Err(_) => {
                // The blocking task still owns the guard and releases on its own.
                warn!(url = %target.url, "Rendered fetch exceeded its overall budget");
                Err(AppError::RenderTimeout {
                    selector: target.selector.to_string(),
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        }
    }
}
