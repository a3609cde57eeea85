use serde::{Deserialize, Serialize};

use super::{FetchStrategy, SelectorSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTarget {
    pub url: String,
    pub selector: SelectorSpec,
}

impl FetchTarget {
    pub fn new(url: impl Into<String>, selector: SelectorSpec) -> Self {
        Self { url: url.into(), selector }
    }
}

/// Page content plus which strategy produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub content: String,
    pub strategy: FetchStrategy,
    pub final_url: String, // After redirects
    pub elapsed_ms: u64,
}
