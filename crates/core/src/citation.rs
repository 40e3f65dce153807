//! Row citations: the evidence behind an AI-produced row.
//!
//! Exactly one variant per row. The variant decides which evidence fields
//! exist, and [`Citation::validate`] checks the required ones are present
//! before anything is stored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provenance::SourceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Citation {
    /// Verbatim substring of a non-tabular document.
    Document {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<String>,
        quote: String,
    },
    /// Cell or sheet reference inside a tabular reference file.
    Spreadsheet {
        location: String,
        #[serde(default)]
        reasoning: String,
    },
    /// Model reasoning or a live web search result.
    Api {
        endpoint: String,
        #[serde(default)]
        reasoning: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationError {
    /// A required evidence field is missing or blank.
    MissingField { kind: &'static str, field: &'static str },
}

impl fmt::Display for CitationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { kind, field } => {
                write!(f, "{kind} citation is missing '{field}'")
            }
        }
    }
}

impl std::error::Error for CitationError {}

impl Citation {
    pub fn kind(&self) -> &'static str {
        match self {
            Citation::Document { .. } => "document",
            Citation::Spreadsheet { .. } => "spreadsheet",
            Citation::Api { .. } => "api",
        }
    }

    pub fn validate(&self) -> Result<(), CitationError> {
        let missing = |field| CitationError::MissingField { kind: self.kind(), field };
        match self {
            Citation::Document { quote, .. } if quote.trim().is_empty() => Err(missing("quote")),
            Citation::Spreadsheet { location, .. } if location.trim().is_empty() => {
                Err(missing("location"))
            }
            Citation::Api { endpoint, .. } if endpoint.trim().is_empty() => Err(missing("endpoint")),
            _ => Ok(()),
        }
    }

    /// One-line summary for tooltips and logs.
    pub fn summary(&self) -> String {
        match self {
            Citation::Document { page: Some(page), quote } => format!("p.{page}: \"{quote}\""),
            Citation::Document { page: None, quote } => format!("\"{quote}\""),
            Citation::Spreadsheet { location, .. } => location.clone(),
            Citation::Api { endpoint, url: Some(url), .. } => format!("{endpoint} ({url})"),
            Citation::Api { endpoint, url: None, .. } => endpoint.clone(),
        }
    }
}

/// Citation record stored per row by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCitation {
    pub origin_source_id: SourceId,
    pub origin_label: String,
    pub citation: Citation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_requires_quote() {
        let c = Citation::Document { page: Some("3".into()), quote: "  ".into() };
        assert_eq!(
            c.validate(),
            Err(CitationError::MissingField { kind: "document", field: "quote" })
        );
        let ok = Citation::Document { page: None, quote: "LM317T regulator".into() };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_spreadsheet_requires_location() {
        let c = Citation::Spreadsheet { location: String::new(), reasoning: "row 4".into() };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_api_url_is_optional() {
        let c = Citation::Api { endpoint: "digikey.com".into(), reasoning: String::new(), url: None };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_tagged_serialization() {
        let c = Citation::Spreadsheet { location: "Sheet1!B4".into(), reasoning: "part number".into() };
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["type"], "spreadsheet");
        assert_eq!(value["location"], "Sheet1!B4");
        assert!(value.get("quote").is_none());
    }
}
