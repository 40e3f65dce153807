// Task adapters and the conversation session over a scripted backend.

mod common;

use gridassist_ai::conversation::FAILURE_TEXT;
use gridassist_ai::{
    extract, quote, Conversation, ExtractError, Gateway, ModelPlan, Part, Proposal, QuoteError,
    ReferenceDocument, Role, Tool, TurnRole,
};
use gridassist_core::grid::grid_from;
use gridassist_core::Citation;

use common::{models, ScriptedBackend};

fn columns() -> Vec<String> {
    vec!["Part".to_string(), "Description".to_string(), "Qty".to_string()]
}

// ===========================================================================
// Extraction
// ===========================================================================

#[test]
fn extraction_reports_the_model_that_answered() {
    let reply = r#"{"rows": [{"data": ["U1", "LM317", "1"], "citation": {"type": "document", "page": "4", "quote": "U1 LM317"}}]}"#;
    let backend = ScriptedBackend::new().fail("fast").ok("slow", reply);
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["fast", "slow"]));
    let doc = ReferenceDocument::inline("board.pdf", "application/pdf", b"%PDF-1.7".to_vec());

    let mut retries = Vec::new();
    let extraction = extract(&gateway, &doc, &columns(), &plan, |f, n| {
        retries.push(format!("{}->{}", f, n))
    })
    .unwrap();

    assert_eq!(retries, vec!["fast->slow"]);
    assert_eq!(extraction.final_model, "slow");
    assert_eq!(extraction.rows.len(), 1);
    assert!(matches!(extraction.rows[0].citation, Some(Citation::Document { .. })));

    let request = backend.last_request();
    assert_eq!(request.config.response_mime_type.as_deref(), Some("application/json"));
    let system = request.system_instruction.unwrap();
    assert!(system.contains("\"document\""));
    assert!(request.contents[0]
        .parts
        .iter()
        .any(|p| matches!(p, Part::InlineData { mime_type, .. } if mime_type == "application/pdf")));
}

#[test]
fn tabular_reference_asks_for_spreadsheet_citations() {
    let backend = ScriptedBackend::new().ok("m", r#"{"rows": []}"#);
    let gateway = Gateway::new(&backend);
    let doc = ReferenceDocument::text("stock.csv", "text/csv", "Part,Qty\nR1,4\n");

    let extraction = extract(&gateway, &doc, &columns(), &ModelPlan::new(models(&["m"])), |_, _| {}).unwrap();
    assert!(extraction.rows.is_empty());

    let request = backend.last_request();
    assert!(request.system_instruction.unwrap().contains("\"spreadsheet\""));
    assert!(matches!(&request.contents[0].parts[1], Part::Text(t) if t.contains("R1,4")));
}

#[test]
fn extraction_exhaustion_is_a_gateway_error() {
    let backend = ScriptedBackend::new().fail("a").fail("b");
    let gateway = Gateway::new(&backend);
    let doc = ReferenceDocument::text("notes.txt", "text/plain", "nothing here");

    let err = extract(&gateway, &doc, &columns(), &ModelPlan::new(models(&["a", "b"])), |_, _| {}).unwrap_err();
    assert!(matches!(err, ExtractError::Gateway(_)));
}

#[test]
fn malformed_extraction_does_not_trigger_fallback() {
    let backend = ScriptedBackend::new().ok("a", "{\"rows\": [oops]}").ok("b", "{\"rows\": []}");
    let gateway = Gateway::new(&backend);
    let doc = ReferenceDocument::text("notes.txt", "text/plain", "R1");

    let err = extract(&gateway, &doc, &columns(), &ModelPlan::new(models(&["a", "b"])), |_, _| {}).unwrap_err();
    assert!(matches!(err, ExtractError::Malformed(_)));
    assert_eq!(backend.models_called(), models(&["a"]));
}

// ===========================================================================
// Quoting
// ===========================================================================

#[test]
fn quoting_covers_every_row_once() {
    let reply = r#"[
      {"rowId": 2, "totalNetPrice": "0.80", "netPricePerUnit": "0.40", "estimatedDelivery": "3 days", "packQuantity": "1", "sourceUrl": "https://lcsc.com/p/2", "reasoning": "stock"},
      {"rowId": 1, "totalNetPrice": "N/A", "netPricePerUnit": "N/A", "estimatedDelivery": "N/A", "packQuantity": "N/A", "sourceUrl": "", "reasoning": "not listed"},
      {"rowId": 3, "totalNetPrice": "2.00", "netPricePerUnit": "2.00", "estimatedDelivery": "1 week", "packQuantity": "1", "sourceUrl": "", "reasoning": "estimate"}
    ]"#;
    let backend = ScriptedBackend::new().ok("search", reply);
    let gateway = Gateway::new(&backend);
    let rows = vec![
        vec!["A".to_string(), "1".to_string()],
        vec!["B".to_string(), "2".to_string()],
        vec!["C".to_string(), "1".to_string()],
    ];
    let headers = vec!["Part".to_string(), "Qty".to_string()];
    let plan = ModelPlan::new(models(&["search"])).with_temperature(0.0);

    let quotes = quote(&gateway, &headers, &rows, &plan, |_, _| {}).unwrap();

    let ids: Vec<usize> = quotes.rows.iter().map(|q| q.row_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(quotes.missing.is_empty());
    assert!(quotes.rows[0].is_not_found());
    assert_eq!(backend.last_request().tools, vec![Tool::GoogleSearch]);
}

#[test]
fn quoting_no_rows_skips_the_model() {
    let backend = ScriptedBackend::new();
    let gateway = Gateway::new(&backend);
    let quotes = quote(&gateway, &[], &[], &ModelPlan::new(models(&["m"])), |_, _| {}).unwrap();
    assert!(quotes.rows.is_empty());
    assert!(backend.models_called().is_empty());
}

#[test]
fn quoting_object_reply_is_rejected() {
    let backend = ScriptedBackend::new().ok("m", r#"{"results": []}"#);
    let gateway = Gateway::new(&backend);
    let rows = vec![vec!["A".to_string()]];
    let err = quote(&gateway, &["Part".to_string()], &rows, &ModelPlan::new(models(&["m"])), |_, _| {})
        .unwrap_err();
    assert_eq!(err, QuoteError::NotAnArray);
}

// ===========================================================================
// Conversation
// ===========================================================================

#[test]
fn chat_records_user_notices_and_reply_in_order() {
    let reply = "Doubled R1.\n```json\n{\"rows\": [{\"index\": 1, \"data\": [\"R1\", \"10k\", \"8\"]}]}\n```";
    let backend = ScriptedBackend::new().fail("m1").fail("m2").ok("m3", reply);
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["m1", "m2", "m3"]));
    let grid = grid_from(&[&["Part", "Description", "Qty"][..], &["R1", "10k", "4"][..]]);

    let mut chat = Conversation::new();
    let outcome = chat.send(&gateway, &plan, "double R1", &[], &grid);

    let roles: Vec<TurnRole> = chat.turns().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![TurnRole::User, TurnRole::System, TurnRole::System, TurnRole::Model]);
    assert!(chat.turns()[1].text.contains("m1") && chat.turns()[1].text.contains("m2"));
    assert!(chat.turns()[2].text.contains("m2") && chat.turns()[2].text.contains("m3"));
    assert_eq!(chat.turns()[3].text, "Doubled R1.");
    assert_eq!(outcome.final_model.as_deref(), Some("m3"));
    assert!(chat.turns().windows(2).all(|w| w[0].id < w[1].id && w[0].created_at <= w[1].created_at));

    let Some(Proposal::Rows(rows)) = outcome.proposal else { panic!("expected row proposal") };
    assert_eq!(rows[0].index, Some(1));
    assert_eq!(rows[0].data[2], "8");
}

#[test]
fn chat_failure_is_an_error_turn() {
    let backend = ScriptedBackend::new().fail("only");
    let gateway = Gateway::new(&backend);
    let mut chat = Conversation::new();
    let grid = grid_from(&[&["Part"][..]]);

    let outcome = chat.send(&gateway, &ModelPlan::new(models(&["only"])), "hi", &[], &grid);

    assert!(outcome.error.is_some());
    assert!(outcome.proposal.is_none());
    let last = chat.turns().last().unwrap();
    assert_eq!(last.role, TurnRole::Model);
    assert!(last.is_error);
    assert_eq!(last.text, FAILURE_TEXT);
}

#[test]
fn replay_skips_system_and_error_turns_and_old_attachments() {
    let backend = ScriptedBackend::new().fail("m1").ok("m2", "Sure.");
    let gateway = Gateway::new(&backend);
    let plan = ModelPlan::new(models(&["m1", "m2"]));
    let grid = grid_from(&[&["Part"][..], &["R1"][..]]);
    let sheet = ReferenceDocument::inline("datasheet.pdf", "application/pdf", vec![1, 2, 3]);

    let mut chat = Conversation::new();
    chat.send(&gateway, &plan, "first", &[sheet.clone()], &grid);
    assert_eq!(chat.turns()[0].attachments, vec!["datasheet.pdf".to_string()]);

    // First request: the current turn carries the attachment inline.
    let first = backend.requests.borrow()[1].clone();
    assert_eq!(first.contents.len(), 1);
    assert!(first.contents[0].parts.iter().any(|p| matches!(p, Part::InlineData { .. })));

    chat.send(&gateway, &plan, "second", &[], &grid);
    let second = backend.last_request();

    let roles: Vec<Role> = second.contents.iter().map(|c| c.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Model, Role::User]);
    assert_eq!(second.contents[0].parts, vec![Part::Text("first".to_string())]);
    assert_eq!(second.contents[1].parts, vec![Part::Text("Sure.".to_string())]);
    assert_eq!(second.contents[2].parts, vec![Part::Text("second".to_string())]);
}

#[test]
fn replay_leaves_out_failure_text_after_an_outage() {
    let down = ScriptedBackend::new().fail("m1");
    let up = ScriptedBackend::new().ok("m1", "Back online.");
    let plan = ModelPlan::new(models(&["m1"]));
    let grid = grid_from(&[&["Part"][..]]);

    let mut chat = Conversation::new();
    let outage = chat.send(&Gateway::new(&down), &plan, "anyone there?", &[], &grid);
    assert!(outage.error.is_some());
    assert!(chat.turns()[1].is_error);

    chat.send(&Gateway::new(&up), &plan, "retry", &[], &grid);
    let request = up.last_request();

    let texts: Vec<&Part> = request.contents.iter().flat_map(|c| c.parts.iter()).collect();
    assert_eq!(
        texts,
        vec![&Part::Text("anyone there?".to_string()), &Part::Text("retry".to_string())]
    );
    assert!(request.contents.iter().all(|c| c.role == Role::User));
}
