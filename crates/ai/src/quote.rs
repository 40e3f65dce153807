// Quoting adapter
//
// Sends rows with 1-based rowIds to a search-enabled model and matches the
// returned price/delivery entries back by rowId. Partial coverage is fine:
// rows the model skipped are reported in `missing`, never invented.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use gridassist_core::{QuotedRow, NOT_FOUND};

use crate::backend::{Content, ModelBackend, Tool};
use crate::gateway::{Gateway, GatewayError, InvokeRequest, ModelPlan};
use crate::json::{cell_text, first_json};
use crate::prompts;

#[derive(Debug, Clone, PartialEq)]
pub struct Quotes {
    /// One entry per matched rowId, sorted by rowId.
    pub rows: Vec<QuotedRow>,
    pub final_model: String,
    /// rowIds that were sent but not returned.
    pub missing: Vec<usize>,
    /// Entries discarded for a bad, duplicate or out-of-range rowId.
    pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuoteError {
    Gateway(GatewayError),
    /// JSON present but unparseable
    Malformed(String),
    /// Parsed, but the top-level value is not an array
    NotAnArray,
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteError::Gateway(e) => write!(f, "{}", e),
            QuoteError::Malformed(msg) => write!(f, "Malformed quote response: {}", msg),
            QuoteError::NotAnArray => write!(f, "Malformed quote response: expected a JSON array"),
        }
    }
}

impl std::error::Error for QuoteError {}

impl From<GatewayError> for QuoteError {
    fn from(e: GatewayError) -> Self {
        QuoteError::Gateway(e)
    }
}

/// Quote `rows` (data rows only, no header). Result rowId `n` refers to
/// `rows[n - 1]`.
pub fn quote<B, F>(
    gateway: &Gateway<B>,
    headers: &[String],
    rows: &[Vec<String>],
    plan: &ModelPlan,
    on_retry: F,
) -> Result<Quotes, QuoteError>
where
    B: ModelBackend,
    F: FnMut(&str, &str),
{
    if rows.is_empty() {
        return Ok(Quotes { rows: Vec::new(), final_model: String::new(), missing: Vec::new(), discarded: 0 });
    }

    let request = InvokeRequest::new(plan, vec![Content::user_text(prompts::quote_message(headers, rows))])
        .system(prompts::quote_system())
        .tool(Tool::GoogleSearch);

    let invocation = gateway.invoke(&request, on_retry)?;
    let mut quotes = parse_quotes(&invocation.text, rows.len())?;
    quotes.final_model = invocation.final_model;

    log::info!(
        "quoted {}/{} rows via {} ({} missing, {} discarded)",
        quotes.rows.len(),
        rows.len(),
        quotes.final_model,
        quotes.missing.len(),
        quotes.discarded
    );
    Ok(quotes)
}

/// Parse the first JSON array in `text` into quotes for `expected` rows.
pub fn parse_quotes(text: &str, expected: usize) -> Result<Quotes, QuoteError> {
    let block = match first_json(text) {
        Ok(Some(block)) => block,
        Ok(None) => return Err(QuoteError::NotAnArray),
        Err(e) => return Err(QuoteError::Malformed(e.to_string())),
    };
    let items = block.value.as_array().ok_or(QuoteError::NotAnArray)?;

    let mut by_id: BTreeMap<usize, QuotedRow> = BTreeMap::new();
    let mut discarded = 0;

    for item in items {
        let Some(obj) = item.as_object() else {
            discarded += 1;
            continue;
        };
        let row_id = obj.get("rowId").and_then(row_id_of);
        match row_id {
            Some(id) if (1..=expected).contains(&id) && !by_id.contains_key(&id) => {
                by_id.insert(id, quoted_row(id, obj));
            }
            _ => {
                log::warn!("discarding quote entry with rowId {:?}", obj.get("rowId"));
                discarded += 1;
            }
        }
    }

    let missing = (1..=expected).filter(|id| !by_id.contains_key(id)).collect();

    Ok(Quotes {
        rows: by_id.into_values().collect(),
        final_model: String::new(),
        missing,
        discarded,
    })
}

fn row_id_of(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn quoted_row(row_id: usize, obj: &Map<String, Value>) -> QuotedRow {
    let field = |name: &str, missing: &str| {
        obj.get(name)
            .map(cell_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| missing.to_string())
    };

    let source_url = field("sourceUrl", "");
    let source_url = if gridassist_core::proposal::is_blank_or_sentinel(&source_url) {
        String::new()
    } else {
        source_url
    };

    QuotedRow {
        row_id,
        total_net_price: field("totalNetPrice", NOT_FOUND),
        net_price_per_unit: field("netPricePerUnit", NOT_FOUND),
        estimated_delivery: field("estimatedDelivery", NOT_FOUND),
        pack_quantity: field("packQuantity", NOT_FOUND),
        source_url,
        reasoning: field("reasoning", ""),
    }
}
