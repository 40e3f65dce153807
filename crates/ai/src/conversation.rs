//! Conversation session.
//!
//! Turn ordering on [`Conversation::send`]:
//!
//! 1. the user turn is appended before any network activity
//! 2. one `system` turn per model fallback, appended as each fallback happens
//! 3. a `model` turn: the reply prose, or fixed error text flagged `is_error`
//!
//! Replay to the model uses only `user` and successful `model` turns, as
//! text. An error turn holds [`FAILURE_TEXT`], which no model wrote, so it
//! is left out of replay along with the notices. Attachments are sent inline
//! for the current turn only.

use chrono::{DateTime, Utc};
use serde_json::Value;

use gridassist_core::{ChatRow, Grid};

use crate::backend::{Content, ModelBackend, Part, Role};
use crate::document::ReferenceDocument;
use crate::gateway::{Gateway, InvokeRequest, ModelPlan};
use crate::json::{first_json, parse_citation, row_cells, strip_block};
use crate::prompts;

/// Shown in place of a reply when no model answered.
pub const FAILURE_TEXT: &str =
    "Sorry, I couldn't get a response from any AI model. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
    /// Fallback notices for the UI; never sent to a model.
    System,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub id: u64,
    pub role: TurnRole,
    pub text: String,
    /// Display names of files attached to this turn.
    pub attachments: Vec<String>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

/// Grid change proposed by a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    /// Targeted rows: in-place updates and appends.
    Rows(Vec<ChatRow>),
    /// Legacy wholesale replacement.
    Replace(Grid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub proposal: Option<Proposal>,
    pub final_model: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    fn push(&mut self, role: TurnRole, text: String, attachments: Vec<String>, is_error: bool) {
        let id = self.next_id;
        self.next_id += 1;
        self.turns.push(ChatTurn { id, role, text, attachments, is_error, created_at: Utc::now() });
    }

    /// Send a message about `grid`. Always leaves the session renderable:
    /// failures become an error-flagged model turn, never an `Err`.
    pub fn send<B: ModelBackend>(
        &mut self,
        gateway: &Gateway<B>,
        plan: &ModelPlan,
        message: &str,
        attachments: &[ReferenceDocument],
        grid: &Grid,
    ) -> ChatOutcome {
        let mut contents = self.replay();

        let mut parts = vec![Part::Text(message.to_string())];
        for doc in attachments {
            parts.extend(doc.to_parts());
        }
        contents.push(Content { role: Role::User, parts });

        self.push(
            TurnRole::User,
            message.to_string(),
            attachments.iter().map(|d| d.name.clone()).collect(),
            false,
        );

        let request = InvokeRequest::new(plan, contents).system(prompts::chat_system(grid));

        let result = gateway.invoke(&request, |failed, next| {
            let notice = format!("{} did not respond. Retrying with {}.", failed, next);
            self.push(TurnRole::System, notice, Vec::new(), false);
        });

        match result {
            Ok(invocation) => {
                let (text, proposal) = split_reply(&invocation.text);
                self.push(TurnRole::Model, text, Vec::new(), false);
                ChatOutcome { proposal, final_model: Some(invocation.final_model), error: None }
            }
            Err(e) => {
                log::warn!("chat request failed: {}", e);
                self.push(TurnRole::Model, FAILURE_TEXT.to_string(), Vec::new(), true);
                ChatOutcome { proposal: None, final_model: None, error: Some(e.to_string()) }
            }
        }
    }

    /// Prior turns as model context.
    pub fn replay(&self) -> Vec<Content> {
        self.turns
            .iter()
            .filter_map(|turn| match turn.role {
                TurnRole::User => Some(Content::user_text(turn.text.clone())),
                TurnRole::Model if !turn.is_error => Some(Content::model_text(turn.text.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Reply prose with the JSON block removed, plus the proposal it carried.
pub fn split_reply(text: &str) -> (String, Option<Proposal>) {
    let block = match first_json(text) {
        Ok(Some(block)) => block,
        Ok(None) => return (text.trim().to_string(), None),
        Err(e) => {
            log::debug!("chat reply JSON did not parse: {}", e);
            return (text.trim().to_string(), None);
        }
    };

    let Some(proposal) = parse_proposal(&block.value) else {
        return (text.trim().to_string(), None);
    };

    let mut prose = strip_block(text, &block.span);
    if prose.is_empty() {
        prose = match &proposal {
            Proposal::Rows(rows) => format!("Proposed changes to {} row(s).", rows.len()),
            Proposal::Replace(grid) => format!("Proposed a full table with {} row(s).", grid.len()),
        };
    }
    (prose, Some(proposal))
}

/// `{"rows": [...]}` → `Rows`; a 2D array → `Replace`.
pub fn parse_proposal(value: &Value) -> Option<Proposal> {
    match value {
        Value::Object(obj) => {
            let items = obj.get("rows")?.as_array()?;
            let rows = items.iter().filter_map(chat_row).collect();
            Some(Proposal::Rows(rows))
        }
        Value::Array(items) => {
            let grid: Option<Grid> = items.iter().map(row_cells).collect();
            grid.filter(|g| !g.is_empty()).map(Proposal::Replace)
        }
        _ => None,
    }
}

fn chat_row(item: &Value) -> Option<ChatRow> {
    let data = item.get("data").and_then(row_cells)?;
    let index = item.get("index").and_then(|v| match v {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    let citation = item.get("citation").and_then(parse_citation);
    Some(ChatRow { index, data, citation })
}
