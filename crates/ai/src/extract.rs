//! Citation-aware extraction adapter.
//!
//! Asks the model for the rows of one reference document that fit the target
//! columns, each with evidence. Outcomes:
//!
//! | Model output                        | Result                         |
//! |-------------------------------------|--------------------------------|
//! | no JSON at all                      | `Ok`, zero rows                |
//! | `{"rows": [...]}` or `[{...}, ...]` | `Ok`, valid rows               |
//! | JSON that does not parse            | `Err(ExtractError::Malformed)` |
//! | JSON of the wrong shape             | `Err(ExtractError::Malformed)` |
//! | every model failed                  | `Err(ExtractError::Gateway)`   |
//!
//! Rows without a `data` array are dropped. A missing or invalid citation
//! never drops its row.

use std::fmt;

use serde_json::Value;

use gridassist_core::ExtractedRow;

use crate::backend::{Content, ModelBackend, Part, Role};
use crate::document::ReferenceDocument;
use crate::gateway::{Gateway, GatewayError, InvokeRequest, ModelPlan};
use crate::json::{first_json, parse_citation, row_cells};
use crate::prompts;

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub rows: Vec<ExtractedRow>,
    pub final_model: String,
    /// Entries without a usable `data` array.
    pub rows_dropped: usize,
    /// Citations present but unusable; their rows were kept.
    pub citations_dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractError {
    Gateway(GatewayError),
    Malformed(String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Gateway(e) => write!(f, "{}", e),
            ExtractError::Malformed(msg) => write!(f, "Malformed extraction response: {}", msg),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<GatewayError> for ExtractError {
    fn from(e: GatewayError) -> Self {
        ExtractError::Gateway(e)
    }
}

pub fn extract<B, F>(
    gateway: &Gateway<B>,
    document: &ReferenceDocument,
    columns: &[String],
    plan: &ModelPlan,
    on_retry: F,
) -> Result<Extraction, ExtractError>
where
    B: ModelBackend,
    F: FnMut(&str, &str),
{
    let mut parts = vec![Part::Text(prompts::extraction_message(&document.name))];
    parts.extend(document.to_parts());

    let request = InvokeRequest::new(plan, vec![Content { role: Role::User, parts }])
        .system(prompts::extraction_system(columns, document.is_tabular()))
        .json_output();

    let invocation = gateway.invoke(&request, on_retry)?;
    let mut extraction = parse_extraction(&invocation.text)?;
    extraction.final_model = invocation.final_model;

    log::info!(
        "extracted {} rows from '{}' via {} ({} dropped, {} citations dropped)",
        extraction.rows.len(),
        document.name,
        extraction.final_model,
        extraction.rows_dropped,
        extraction.citations_dropped
    );
    Ok(extraction)
}

/// Parse model text into rows. `final_model` is left empty.
pub fn parse_extraction(text: &str) -> Result<Extraction, ExtractError> {
    let mut extraction = Extraction {
        rows: Vec::new(),
        final_model: String::new(),
        rows_dropped: 0,
        citations_dropped: 0,
    };

    let block = match first_json(text) {
        Ok(Some(block)) => block,
        Ok(None) => {
            log::debug!("extraction response has no JSON; treating as zero rows");
            return Ok(extraction);
        }
        Err(e) => return Err(ExtractError::Malformed(e.to_string())),
    };

    let items = match &block.value {
        Value::Object(obj) => match obj.get("rows") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => return Ok(extraction),
            _ => return Err(ExtractError::Malformed("expected a \"rows\" array".to_string())),
        },
        Value::Array(items) => items,
        _ => return Err(ExtractError::Malformed("expected an object or array".to_string())),
    };

    for item in items {
        let Some(data) = item.get("data").and_then(row_cells) else {
            log::warn!("dropping extracted entry without a data array");
            extraction.rows_dropped += 1;
            continue;
        };

        let citation = match item.get("citation") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let parsed = parse_citation(raw);
                if parsed.is_none() {
                    log::warn!("dropping invalid citation: {}", raw);
                    extraction.citations_dropped += 1;
                }
                parsed
            }
        };

        extraction.rows.push(ExtractedRow { data, citation });
    }

    Ok(extraction)
}
