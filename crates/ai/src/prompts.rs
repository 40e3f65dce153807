// Task instructions for the three model-backed workflows

use serde_json::json;

use gridassist_core::Grid;

pub fn extraction_system(columns: &[String], tabular: bool) -> String {
    let citation_rule = if tabular {
        r#"Each row MUST carry a citation of type "spreadsheet":
  {"type": "spreadsheet", "location": "<sheet and cell/row reference, e.g. Sheet1!A7:D7>", "reasoning": "<why this row maps to the columns>"}"#
    } else {
        r#"Each row MUST carry a citation of type "document":
  {"type": "document", "page": "<page number or null>", "quote": "<verbatim text copied from the document>"}
The quote must be an exact substring of the document. Never paraphrase."#
    };

    format!(
        r#"You extract table rows from a reference document into a spreadsheet.

TARGET COLUMNS (in order):
{columns}

CRITICAL INSTRUCTIONS:
1. Find literal evidence in the document BEFORE emitting any row.
2. Emit one row per item you can justify, with values in the target column order.
3. Use an empty string for a column the document does not mention.
4. If the document contains no matching data (source code, prose without part numbers, etc.),
   return {{"rows": []}}. NEVER invent rows.
5. Return ONLY valid JSON. No text before or after it.

CITATIONS:
{citation_rule}

RESPONSE FORMAT:
{{"rows": [{{"data": ["value", "..."], "citation": {{...}}}}]}}"#,
        columns = numbered(columns),
        citation_rule = citation_rule,
    )
}

pub fn extraction_message(document_name: &str) -> String {
    format!(
        "Extract every row matching the target columns from the reference file \"{}\" below.",
        document_name
    )
}

pub fn quote_system() -> String {
    r#"You are a purchasing assistant. For every input row, search the web for a current
distributor listing and report price and delivery.

CRITICAL INSTRUCTIONS:
1. Return exactly one result per input row, keyed by its rowId.
2. If you cannot find a listing, still return the row with "N/A" for the price,
   delivery and pack fields and explain in "reasoning".
3. "sourceUrl" must be a real URL you retrieved. If you have no verifiable link,
   use an empty string. NEVER fabricate URLs.
4. Prices are net prices in the listing's currency, formatted as plain numbers.
5. Return ONLY a JSON array. No text before or after it.

RESPONSE FORMAT:
[{"rowId": 1, "totalNetPrice": "12.40", "netPricePerUnit": "3.10", "estimatedDelivery": "5 days",
  "packQuantity": "1", "sourceUrl": "https://...", "reasoning": "..."}]"#
        .to_string()
}

/// Rows are numbered from 1 in the order given; results refer back by rowId.
pub fn quote_message(headers: &[String], rows: &[Vec<String>]) -> String {
    let items: Vec<serde_json::Value> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let fields: serde_json::Map<String, serde_json::Value> = headers
                .iter()
                .zip(row.iter())
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(h, v)| (h.clone(), json!(v)))
                .collect();
            json!({ "rowId": i + 1, "fields": fields })
        })
        .collect();

    format!(
        "Quote the following {} row(s). Return {} result(s).\n\nROWS:\n{}",
        rows.len(),
        rows.len(),
        serde_json::to_string_pretty(&items).unwrap_or_default()
    )
}

/// The current grid is embedded with explicit row indices so the model can
/// target rows without echoing the whole table back.
pub fn chat_system(grid: &Grid) -> String {
    let headers = grid.first().cloned().unwrap_or_default();
    let rows: Vec<serde_json::Value> = grid
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, data)| json!({ "index": index, "data": data }))
        .collect();

    format!(
        r#"You are a spreadsheet assistant editing the user's table.

HEADERS:
{headers}

ROWS:
{rows}

When the user asks for changes, reply with a short explanation followed by ONE JSON block:
{{"rows": [{{"index": 3, "data": ["...", "..."], "citation": {{"type": "api", "endpoint": "<source>", "reasoning": "<why>"}}}}]}}

RULES:
1. Include ONLY rows you change or add. Unmentioned rows are kept as they are.
2. "index" is the row index shown above. Omit it to append a new row.
3. "data" lists every column value of the row, in header order.
4. Row index 0 is the header row and cannot be targeted.
5. If no change is needed, answer in plain text without JSON."#,
        headers = serde_json::to_string(&headers).unwrap_or_default(),
        rows = serde_json::to_string_pretty(&rows).unwrap_or_default(),
    )
}

fn numbered(columns: &[String]) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n")
}
