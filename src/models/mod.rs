use serde::{Deserialize, Serialize};

pub mod observation;
pub mod page;

// Re-exports for convenience
pub use observation::*;
pub use page::*;

/// How a page is obtained. Chosen explicitly per target: script-driven pages
/// that only populate the price after client-side execution need `Rendered`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    Static,
    Rendered,
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStrategy::Static => write!(f, "static"),
            FetchStrategy::Rendered => write!(f, "rendered"),
        }
    }
}

/// Where in a page the price lives: a CSS selector and which of its matches
/// to read (zero-based).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorSpec {
    pub css: String,
    #[serde(default)]
    pub index: usize,
}

impl SelectorSpec {
    pub fn new(css: impl Into<String>, index: usize) -> Self {
        Self { css: css.into(), index }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::new(css, 0)
    }

    pub fn id(id: &str) -> Self {
        Self::new(format!("#{}", id), 0)
    }
}

impl std::fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.css)
        } else {
            write!(f, "{} [match {}]", self.css, self.index)
        }
    }
}
