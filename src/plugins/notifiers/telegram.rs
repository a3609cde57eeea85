use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::NotifierConfig;
use crate::plugins::traits::Notifier;
use crate::{AppError, Result};

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API delivery: `sendMessage` for text (HTML parse mode) and
/// `sendPhoto` for the trend chart.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    api_base: String,
    chart_caption: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            token: token.into(),
            api_base: api_base.into(),
            chart_caption: None,
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let notifier = Self::new(
            config.token.clone(),
            config.api_base.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(notifier.with_caption(config.chart_caption.clone()))
    }

    /// Blank captions are omitted.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        self.chart_caption = if caption.trim().is_empty() { None } else { Some(caption) };
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base.trim_end_matches('/'), self.token, method)
    }

    // reqwest errors embed the request URL, which carries the bot token.
    fn send_error(method: &str, err: reqwest::Error) -> AppError {
        AppError::Delivery(format!("Telegram {} request failed: {}", method, err.without_url()))
    }

    async fn check_response(method: &str, response: Response) -> Result<()> {
        let status = response.status();
        let body = response.json::<TelegramResponse>().await.ok();

        match body {
            Some(body) if status.is_success() && body.ok => Ok(()),
            Some(body) => Err(AppError::Delivery(format!(
                "Telegram {} rejected ({}): {}",
                method,
                status,
                body.description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(AppError::Delivery(format!(
                "Telegram {} returned an unreadable response ({})",
                method, status
            ))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": destination,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::send_error("sendMessage", e))?;

        Self::check_response("sendMessage", response).await?;
        info!(destination, "Telegram message sent");
        Ok(())
    }

    async fn send_image(&self, destination: &str, image_path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(image_path).await.map_err(|e| {
            AppError::Delivery(format!("Failed to read image {}: {}", image_path.display(), e))
        })?;

        let file_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "chart.png".to_string());
        let photo = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| Self::send_error("sendPhoto", e))?;

        let mut form = Form::new()
            .text("chat_id", destination.to_string())
            .part("photo", photo);
        if let Some(caption) = &self.chart_caption {
            form = form.text("caption", caption.clone());
        }

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::send_error("sendPhoto", e))?;

        Self::check_response("sendPhoto", response).await?;
        info!(destination, path = %image_path.display(), "Telegram photo sent");
        Ok(())
    }
}
