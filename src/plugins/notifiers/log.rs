use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::plugins::traits::Notifier;
use crate::Result;

/// Logs instead of delivering. Used for dry runs.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        info!(destination, %text, "Dry run: message not delivered");
        Ok(())
    }

    async fn send_image(&self, destination: &str, image_path: &Path) -> Result<()> {
        info!(destination, path = %image_path.display(), "Dry run: image not delivered");
        Ok(())
    }
}
