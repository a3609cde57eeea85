use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use tracing::debug;

use crate::models::SelectorSpec;
use crate::{AppError, Result};

/// The only currency handled; amounts use comma thousands separators.
pub const CURRENCY_SYMBOL: &str = "₹";
const CURRENCY_LABELS: [&str; 3] = [CURRENCY_SYMBOL, "Rs.", "Rs"];

/// Finds the price element in fetched HTML and reads a rupee amount from it.
/// Works on whatever content the fetcher produced, static or rendered.
pub struct PriceExtractor {
    price_regex: Regex,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceExtractor {
    pub fn new() -> Self {
        PriceExtractor {
            // Western (10,190) and Indian (1,00,000) grouping, optional fraction.
            price_regex: Regex::new(r"[0-9]+(?:,[0-9]+)*(?:\.[0-9]+)?").expect("static price pattern"),
        }
    }

    pub fn extract(&self, content: &str, spec: &SelectorSpec) -> Result<Decimal> {
        let text = self.element_text(content, spec)?;
        debug!(selector = %spec, text = %text, "Located price element");
        self.parse_price(&text)
    }

    /// Whitespace-normalised text of the `spec.index`-th match.
    pub fn element_text(&self, content: &str, spec: &SelectorSpec) -> Result<String> {
        let document = Html::parse_document(content);
        let selector = Selector::parse(&spec.css)
            .map_err(|e| AppError::invalid_selector(&spec.css, format!("{:?}", e)))?;

        let element = document
            .select(&selector)
            .nth(spec.index)
            .ok_or_else(|| AppError::ElementNotFound { selector: spec.to_string() })?;

        Ok(element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
    }

    /// First digit run after the currency label, or the first one anywhere
    /// when no label is present ("22 KT(1g) - ₹ 10,190" reads 10190, not 22).
    pub fn parse_price(&self, text: &str) -> Result<Decimal> {
        let text = text.trim();

        let after_label = CURRENCY_LABELS
            .iter()
            .find_map(|label| text.find(label).map(|pos| &text[pos + label.len()..]))
            .and_then(|rest| self.price_regex.find(rest));

        let found = after_label
            .or_else(|| self.price_regex.find(text))
            .ok_or_else(|| AppError::parse(format!("no price digits in '{}'", text)))?;

        let digits = found.as_str().replace(',', "");
        let price = Decimal::from_str(&digits)
            .map_err(|e| AppError::parse(format!("'{}' is not a valid amount: {}", found.as_str(), e)))?;

        if price <= Decimal::ZERO {
            return Err(AppError::parse(format!("price must be positive, got '{}'", found.as_str())));
        }

        Ok(price)
    }
}
