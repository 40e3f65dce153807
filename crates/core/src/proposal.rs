//! Proposed changes produced by the AI adapters.
//!
//! Adapters never touch the grid. They return these values and the engine
//! applies them in one step.

use serde::{Deserialize, Serialize};

use crate::citation::Citation;

/// Sentinel for "checked, nothing found" in quoting results.
pub const NOT_FOUND: &str = "N/A";

/// One row extracted from a reference document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRow {
    pub data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
}

impl ExtractedRow {
    pub fn new(data: Vec<String>) -> Self {
        Self { data, citation: None }
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = Some(citation);
        self
    }
}

/// One row of a structured conversational edit.
///
/// `index` targets an existing grid row (header is row 0); a missing or
/// out-of-range index means "append".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
}

/// Pricing/delivery result for one quoted row.
///
/// `row_id` is 1-based and positional: it refers to the n-th row sent in the
/// quoting request, not to a grid index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedRow {
    pub row_id: usize,
    pub total_net_price: String,
    pub net_price_per_unit: String,
    pub estimated_delivery: String,
    pub pack_quantity: String,
    pub source_url: String,
    pub reasoning: String,
}

impl QuotedRow {
    /// Entry for a row the model checked but found nothing for.
    pub fn not_found(row_id: usize, reasoning: impl Into<String>) -> Self {
        Self {
            row_id,
            total_net_price: NOT_FOUND.to_string(),
            net_price_per_unit: NOT_FOUND.to_string(),
            estimated_delivery: NOT_FOUND.to_string(),
            pack_quantity: NOT_FOUND.to_string(),
            source_url: String::new(),
            reasoning: reasoning.into(),
        }
    }

    /// True when none of the price/delivery fields carry a value.
    pub fn is_not_found(&self) -> bool {
        [&self.total_net_price, &self.net_price_per_unit, &self.estimated_delivery]
            .iter()
            .all(|v| is_blank_or_sentinel(v))
    }

    /// Host part of `source_url` without a leading `www.`.
    pub fn source_domain(&self) -> Option<String> {
        let trimmed = self.source_url.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parsed = url::Url::parse(trimmed)
            .or_else(|_| url::Url::parse(&format!("https://{trimmed}")))
            .ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }
}

pub fn is_blank_or_sentinel(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case(NOT_FOUND) || v.eq_ignore_ascii_case("not found")
}
