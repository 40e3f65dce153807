//! Recovery of structured output from free-form model text.
//!
//! Models wrap JSON in prose or markdown fences. [`first_json`] scans for the
//! first top-level `{...}` or `[...]` block (string- and escape-aware) and
//! parses it. Three outcomes are kept distinct:
//!
//! - `Ok(None)`: the text contains no JSON delimiter at all
//! - `Ok(Some(block))`: a block parsed
//! - `Err(_)`: delimiters were present but nothing parsed

use std::fmt;
use std::ops::Range;

use serde_json::Value;

use gridassist_core::Citation;

#[derive(Debug, Clone, PartialEq)]
pub struct JsonBlock {
    pub value: Value,
    /// Byte range of the block inside the source text.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonError(pub String);

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid JSON: {}", self.0)
    }
}

impl std::error::Error for JsonError {}

/// First top-level JSON object or array in `text`.
///
/// A candidate that fails to parse is skipped as a whole (its interior is
/// never searched), so a broken outer object cannot be mistaken for one of
/// its nested arrays.
pub fn first_json(text: &str) -> Result<Option<JsonBlock>, JsonError> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut first_error = None;

    while let Some(offset) = bytes[pos..].iter().position(|b| *b == b'{' || *b == b'[') {
        let start = pos + offset;
        let end = balanced_end(bytes, start).unwrap_or(bytes.len());
        let candidate = &text[start..end];

        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(Some(JsonBlock { value, span: start..end })),
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
        pos = end;
    }

    match first_error {
        Some(e) => Err(JsonError(e)),
        None => Ok(None),
    }
}

/// Index one past the delimiter closing the block opened at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// `text` with `span` removed, along with a markdown fence wrapping it.
pub fn strip_block(text: &str, span: &Range<usize>) -> String {
    let mut before = &text[..span.start];
    let mut after = &text[span.end..];

    let trimmed_before = before.trim_end();
    let fence_open = ["```json", "```JSON", "```"]
        .iter()
        .find(|fence| trimmed_before.ends_with(*fence));
    let trimmed_after = after.trim_start();
    if let (Some(fence), true) = (fence_open, trimmed_after.starts_with("```")) {
        before = &trimmed_before[..trimmed_before.len() - fence.len()];
        after = &trimmed_after[3..];
    }

    let before = before.trim_end();
    let after = after.trim_start();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{}\n\n{}", before, after),
    }
}

/// Cell value as grid text. Strings verbatim, null as empty, scalars in
/// their JSON form, nested values serialized.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Row data array as grid text.
pub fn row_cells(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|cells| cells.iter().map(cell_text).collect())
}

/// Lenient citation parsing.
///
/// The `type` discriminant is matched case-insensitively and inferred from
/// the evidence fields when missing. Returns `None` for anything that does
/// not describe a valid citation.
pub fn parse_citation(value: &Value) -> Option<Citation> {
    let obj = value.as_object()?;
    let field = |name: &str| obj.get(name).map(cell_text).map(|s| s.trim().to_string());
    let present = |name: &str| field(name).map(|s| !s.is_empty()).unwrap_or(false);

    let kind = match obj.get("type").and_then(|t| t.as_str()) {
        Some(t) => t.trim().to_lowercase(),
        None if present("quote") => "document".to_string(),
        None if present("location") => "spreadsheet".to_string(),
        None if present("endpoint") => "api".to_string(),
        None => return None,
    };

    let citation = match kind.as_str() {
        "document" => Citation::Document {
            page: field("page").filter(|p| !p.is_empty()),
            quote: field("quote").unwrap_or_default(),
        },
        "spreadsheet" => Citation::Spreadsheet {
            location: field("location").unwrap_or_default(),
            reasoning: field("reasoning").unwrap_or_default(),
        },
        "api" => Citation::Api {
            endpoint: field("endpoint").unwrap_or_default(),
            reasoning: field("reasoning").unwrap_or_default(),
            url: field("url").filter(|u| !u.is_empty()),
        },
        _ => return None,
    };

    citation.validate().ok()?;
    Some(citation)
}
