pub mod chart;
pub mod config;
pub mod fetcher;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod plugins;
pub mod price_extractor;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{FetchStrategy, Observation, Series};
pub use pipeline::{RateWatcher, RunOutcome, RunReport, RunSettings};
pub use utils::error::{AppError, FailureClass};

pub type Result<T> = std::result::Result<T, AppError>;
