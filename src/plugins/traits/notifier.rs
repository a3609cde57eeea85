use async_trait::async_trait;
use std::path::Path;

use crate::Result;

/// Message delivery boundary (Telegram, logs, ...). Text and image sends are
/// independent: callers may attempt one after the other has failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, destination: &str, text: &str) -> Result<()>;
    async fn send_image(&self, destination: &str, image_path: &Path) -> Result<()>;
}
