// Integration tests for Gold Rate Watcher
// These tests run whole pipelines against local mock servers and temp dirs

pub mod history_tests;
pub mod pipeline_tests;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use gold_rate_watcher::chart::ChartRenderer;
use gold_rate_watcher::fetcher::{PageFetcher, StaticFetcher, UserAgentPool};
use gold_rate_watcher::history::CsvHistoryStore;
use gold_rate_watcher::models::{FetchTarget, SelectorSpec};
use gold_rate_watcher::plugins::Notifier;
use gold_rate_watcher::price_extractor::PriceExtractor;
use gold_rate_watcher::{FetchStrategy, RateWatcher, RunSettings};

pub const CHAT_ID: &str = "-100123";

/// Trimmed copy of the GRT Jewels header dropdown.
pub const GRT_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <div class="header-rates">
      <button id="dropdown-basic-button1" type="button">
        GOLD 22 KT(1g) - ₹ 10,190
      </button>
      <ul class="dropdown-menu">
        <li>GOLD 24 KT(1g) - ₹ 11,117</li>
        <li>SILVER (1g) - ₹ 140</li>
      </ul>
    </div>
  </body>
</html>"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { destination: String, text: String },
    Image { destination: String, path: PathBuf },
}

/// Records every delivery so tests can assert on what went out.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { text, .. } => Some(text),
                Sent::Image { .. } => None,
            })
            .collect()
    }

    pub fn images(&self) -> Vec<PathBuf> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Image { path, .. } => Some(path),
                Sent::Text { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, destination: &str, text: &str) -> gold_rate_watcher::Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            destination: destination.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(&self, destination: &str, image_path: &Path) -> gold_rate_watcher::Result<()> {
        self.sent.lock().unwrap().push(Sent::Image {
            destination: destination.to_string(),
            path: image_path.to_path_buf(),
        });
        Ok(())
    }
}

/// Files a run touches, rooted in a temp dir that lives as long as this does.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.path().join("data").join("gold_prices.csv")
    }

    pub fn chart_path(&self) -> PathBuf {
        self.dir.path().join("data").join("gold_price_history.png")
    }

    pub fn seed_history(&self, contents: &str) {
        let path = self.history_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn history_contents(&self) -> String {
        std::fs::read_to_string(self.history_path()).unwrap_or_default()
    }
}

/// A static-fetch watcher pointed at `url`, storing into `workspace`.
pub fn static_watcher(url: &str, workspace: &Workspace, notifier: Box<dyn Notifier>) -> RateWatcher {
    let settings = RunSettings {
        target: FetchTarget::new(url, SelectorSpec::id("dropdown-basic-button1")),
        strategy: FetchStrategy::Static,
        destination: CHAT_ID.to_string(),
    };
    let fetcher = PageFetcher::new().with_backend(
        StaticFetcher::new(Duration::from_secs(5), UserAgentPool::default()).unwrap(),
    );

    RateWatcher::new(
        settings,
        fetcher,
        PriceExtractor::new(),
        Box::new(CsvHistoryStore::new(workspace.history_path())),
        Box::new(ChartRenderer::with_size(workspace.chart_path(), 400, 200)),
        notifier,
    )
}
