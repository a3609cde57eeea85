use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport error reaching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Timed out after {timeout_ms}ms waiting for element: {selector}")]
    RenderTimeout { selector: String, timeout_ms: u64 },

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse category of a failed run, worded for the person reading the
/// notification rather than for the operator reading logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    SiteUnreachable,
    BrowserSession,
    LayoutChanged,
    UnreadablePrice,
    Internal,
}

impl FailureClass {
    pub fn describe(&self) -> &'static str {
        match self {
            FailureClass::SiteUnreachable => "the jeweller's site could not be reached",
            FailureClass::BrowserSession => "the browser session failed",
            FailureClass::LayoutChanged => "the page layout changed",
            FailureClass::UnreadablePrice => "the price text could not be read",
            FailureClass::Internal => "an internal error occurred",
        }
    }
}

impl AppError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            AppError::Transport { .. } => FailureClass::SiteUnreachable,
            AppError::RenderTimeout { .. } => FailureClass::LayoutChanged,
            AppError::Driver(_) => FailureClass::BrowserSession,
            AppError::ElementNotFound { .. } => FailureClass::LayoutChanged,
            AppError::Parse { .. } => FailureClass::UnreadablePrice,
            _ => FailureClass::Internal,
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        AppError::Parse { message: message.into() }
    }

    pub(crate) fn invalid_selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        AppError::Config(config::ConfigError::Message(format!(
            "Invalid CSS selector '{}': {}",
            selector, reason
        )))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
