//! Grid reconciliation engine.
//!
//! `Document` owns the [`DocumentState`] triple and is the only thing that
//! mutates it. Every mutating operation snapshots the pre-mutation state into
//! [`History`] first, so any merge can be undone as one step.
//!
//! Merge semantics:
//! - Extraction: clean every row the source owns, then append the new rows.
//!   Re-running an extraction never duplicates rows.
//! - Quoting: write price/delivery into three located-or-created columns of
//!   the targeted rows; other cells are untouched.
//! - Conversational rows: in-place overwrite for valid indices, append for
//!   the rest; unmentioned rows are never touched.
//! - Conversational replace: wholesale swap, tagging only changed cells.

use std::collections::BTreeSet;

use gridassist_core::grid::pad_rows;
use gridassist_core::{
    ChatRow, Citation, ExtractedRow, Grid, ProvenanceTag, QuotedRow, RowCitation, SourceId,
    SourceRef,
};

use crate::error::EngineError;
use crate::history::History;
use crate::reference::{ReferenceFile, ReferenceFiles};
use crate::state::DocumentState;

/// Source id recorded on citations produced by the chat assistant.
pub const CHAT_SOURCE_ID: &str = "chat";
pub const CHAT_SOURCE_LABEL: &str = "AI Assistant";

/// Columns written by a quoting merge, in (title, match needles) form.
/// Resolved in this order so the more specific "price/unit" header is
/// claimed before "net price" can match it.
const QUOTE_COLUMNS: [(&str, &[&str]); 3] = [
    ("Price/Unit", &["price/unit", "unit price", "price per unit"]),
    ("Net Price", &["net price", "total price", "total net"]),
    ("Est. Delivery", &["delivery", "lead time"]),
];

/// Fallback endpoint label when a quote has no source link.
const QUOTE_ENDPOINT_FALLBACK: &str = "web search";

/// What a merge did. Returned by every merge operation; never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub source: Option<SourceId>,
    pub rows_removed: usize,
    pub rows_added: usize,
    pub rows_updated: usize,
    pub cells_tagged: usize,
    pub columns_added: Vec<String>,
    /// Citations rejected by validation (the rows themselves were kept).
    pub citations_dropped: usize,
    /// Results that could not be mapped to a row.
    pub skipped: usize,
    /// Legacy full-grid replacement (flagged to the user).
    pub replaced_all: bool,
    /// Per-source error for display; the merge still committed a clean state.
    pub error: Option<String>,
}

/// What removing a source's contributions did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub rows_removed: usize,
    pub cells_cleared: usize,
    pub citations_removed: usize,
}

#[derive(Debug, Clone)]
pub struct Document {
    state: DocumentState,
    original: Grid,
    history: History,
    files: ReferenceFiles,
}

impl Document {
    pub fn new(grid: Grid) -> Self {
        let state = DocumentState::from_grid(grid);
        Self {
            original: state.grid.clone(),
            state,
            history: History::new(),
            files: ReferenceFiles::default(),
        }
    }

    /// Replace the main grid. Drops provenance, citations, history and every
    /// reference file.
    pub fn load_grid(&mut self, grid: Grid) {
        *self = Self::new(grid);
        log::debug!(
            "loaded grid: {} data rows, {} columns",
            self.state.data_row_count(),
            self.state.width()
        );
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn grid(&self) -> &Grid {
        &self.state.grid
    }

    pub fn tag(&self, row: usize, col: usize) -> Option<&ProvenanceTag> {
        self.state.tag(row, col)
    }

    pub fn citation(&self, row: usize) -> Option<&RowCitation> {
        self.state.citation(row)
    }

    /// Highlight color of a cell extracted from a still-attached reference file.
    pub fn highlight(&self, row: usize, col: usize) -> Option<u32> {
        match self.state.tag(row, col)? {
            ProvenanceTag::Extraction(id) => self.files.get(id).map(|f| f.color()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    fn commit(&mut self) {
        self.history.commit(&self.state);
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.state) {
            Some(previous) => {
                self.state = previous;
                self.sync_reference_files();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.state) {
            Some(next) => {
                self.state = next;
                self.sync_reference_files();
                true
            }
            None => false,
        }
    }

    /// Re-attach a removed reference file while the restored state still
    /// holds its rows, and detach it again once they are gone.
    fn sync_reference_files(&mut self) {
        let state = &self.state;
        self.files.sync(|id| {
            state
                .provenance
                .values()
                .any(|tag| matches!(tag, ProvenanceTag::Extraction(owner) if owner == id))
        });
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restore the grid as loaded. Undoable.
    pub fn reset_to_original(&mut self) {
        self.commit();
        self.state = DocumentState::from_grid(self.original.clone());
    }

    // ------------------------------------------------------------------
    // Manual edits
    // ------------------------------------------------------------------

    /// Write one cell as a manual edit. Returns `Ok(false)` without touching
    /// history when the value is unchanged.
    pub fn set_cell(&mut self, row: usize, col: usize, value: &str) -> Result<bool, EngineError> {
        if row >= self.state.grid.len() {
            return Err(EngineError::OutOfBounds { row, rows: self.state.grid.len() });
        }
        if self.state.cell(row, col).unwrap_or("") == value {
            return Ok(false);
        }
        self.commit();
        self.state.write_cell(row, col, value);
        self.state.set_tag(row, col, ProvenanceTag::User);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Reference files
    // ------------------------------------------------------------------

    pub fn add_reference_file(&mut self, display_name: impl Into<String>) -> ReferenceFile {
        self.files.add(display_name)
    }

    pub fn reference_files(&self) -> impl Iterator<Item = &ReferenceFile> {
        self.files.iter()
    }

    pub fn reference_file(&self, id: &SourceId) -> Option<&ReferenceFile> {
        self.files.get(id)
    }

    /// Detach a reference file and remove every row it produced. Undoing the
    /// removal brings the rows and the handle back.
    pub fn remove_reference_file(&mut self, id: &SourceId) -> Option<RemovalSummary> {
        let file = self.files.remove(id)?;
        let summary = self.remove_source(&file.id);
        log::info!(
            "removed reference file '{}': {} rows dropped",
            file.display_name,
            summary.rows_removed
        );
        Some(summary)
    }

    // ------------------------------------------------------------------
    // Source cleaning
    // ------------------------------------------------------------------

    /// Remove every contribution of `source`. Undoable.
    pub fn remove_source(&mut self, source: &SourceId) -> RemovalSummary {
        self.commit();
        clean_source(&mut self.state, source)
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    /// Clean the source's previous rows, then append `rows` tagged with it.
    pub fn merge_extraction(&mut self, source: &SourceRef, rows: &[ExtractedRow]) -> MergeReport {
        self.commit();
        let removal = clean_source(&mut self.state, &source.id);

        let mut report = MergeReport {
            source: Some(source.id.clone()),
            rows_removed: removal.rows_removed,
            ..MergeReport::default()
        };

        for row in rows {
            if row.data.is_empty() {
                report.skipped += 1;
                continue;
            }
            let index = self.state.push_row(row.data.clone());
            let width = self.state.grid[index].len();
            for col in 0..width {
                self.state.set_tag(index, col, ProvenanceTag::Extraction(source.id.clone()));
            }
            report.cells_tagged += width;
            report.rows_added += 1;

            if let Some(citation) = &row.citation {
                if !record_citation(&mut self.state, index, source, citation) {
                    report.citations_dropped += 1;
                }
            }
        }

        log::info!(
            "extraction '{}': -{} +{} rows ({} citations dropped)",
            source.label,
            report.rows_removed,
            report.rows_added,
            report.citations_dropped
        );
        report
    }

    /// A failed extraction still commits the cleaned state so a failed retry
    /// leaves no stale rows behind.
    pub fn fail_extraction(&mut self, source: &SourceRef, message: impl Into<String>) -> MergeReport {
        self.commit();
        let removal = clean_source(&mut self.state, &source.id);
        let message = message.into();
        log::warn!("extraction '{}' failed: {}", source.label, message);
        MergeReport {
            source: Some(source.id.clone()),
            rows_removed: removal.rows_removed,
            error: Some(message),
            ..MergeReport::default()
        }
    }

    // ------------------------------------------------------------------
    // Quoting
    // ------------------------------------------------------------------

    /// Apply quoting results. `targets[n - 1]` is the grid row that quote
    /// `rowId == n` refers to.
    pub fn merge_quotes(
        &mut self,
        session: &SourceRef,
        targets: &[usize],
        quotes: &[QuotedRow],
    ) -> MergeReport {
        self.commit();
        let mut report = MergeReport {
            source: Some(session.id.clone()),
            ..MergeReport::default()
        };

        let columns = ensure_quote_columns(&mut self.state, &mut report.columns_added);
        let [unit_col, net_col, delivery_col] = columns;

        for quote in quotes {
            let row = quote
                .row_id
                .checked_sub(1)
                .and_then(|i| targets.get(i))
                .copied()
                .filter(|&r| r > 0 && r < self.state.grid.len());
            let Some(row) = row else {
                log::warn!("quote rowId {} does not map to a grid row", quote.row_id);
                report.skipped += 1;
                continue;
            };

            for (col, value) in [
                (net_col, &quote.total_net_price),
                (unit_col, &quote.net_price_per_unit),
                (delivery_col, &quote.estimated_delivery),
            ] {
                self.state.write_cell(row, col, value);
                self.state.set_tag(row, col, ProvenanceTag::Quote(session.id.clone()));
                report.cells_tagged += 1;
            }

            let citation = quote_citation(quote);
            if !record_citation(&mut self.state, row, session, &citation) {
                report.citations_dropped += 1;
            }
            report.rows_updated += 1;
        }

        log::info!(
            "quotes '{}': {} rows updated, {} skipped, columns added: {:?}",
            session.label,
            report.rows_updated,
            report.skipped,
            report.columns_added
        );
        report
    }

    // ------------------------------------------------------------------
    // Conversational edits
    // ------------------------------------------------------------------

    /// Structured partial merge: indexed rows overwrite in place, the rest
    /// append. Rows not mentioned are left exactly as they were.
    pub fn merge_chat_rows(&mut self, rows: &[ChatRow]) -> MergeReport {
        self.commit();
        let chat = chat_source();
        let mut report = MergeReport::default();
        // Indices refer to the grid the model saw, not rows appended below.
        let base_len = self.state.grid.len();

        for row in rows {
            let target = row.index.filter(|&i| i >= 1 && i < base_len);
            let index = match target {
                Some(index) => {
                    for (col, value) in row.data.iter().enumerate() {
                        if self.state.cell(index, col).unwrap_or("") != value.as_str() {
                            self.state.write_cell(index, col, value);
                            self.state.set_tag(index, col, ProvenanceTag::Ai);
                            report.cells_tagged += 1;
                        }
                    }
                    report.rows_updated += 1;
                    index
                }
                None => {
                    if row.data.is_empty() {
                        report.skipped += 1;
                        continue;
                    }
                    let index = self.state.push_row(row.data.clone());
                    let width = self.state.grid[index].len();
                    for col in 0..width {
                        self.state.set_tag(index, col, ProvenanceTag::Ai);
                    }
                    report.cells_tagged += width;
                    report.rows_added += 1;
                    index
                }
            };

            if let Some(citation) = &row.citation {
                if !record_citation(&mut self.state, index, &chat, citation) {
                    report.citations_dropped += 1;
                }
            }
        }

        log::info!(
            "chat merge: {} rows updated, {} appended",
            report.rows_updated,
            report.rows_added
        );
        report
    }

    /// Legacy full replacement. Only cells whose value changed, and every
    /// cell of a new row, are tagged `ai`. An empty grid is rejected since
    /// the header row can never be deleted.
    pub fn merge_chat_replace(&mut self, grid: Grid) -> MergeReport {
        if grid.is_empty() {
            return MergeReport {
                replaced_all: true,
                error: Some("replacement grid is empty; header row kept".to_string()),
                ..MergeReport::default()
            };
        }

        self.commit();
        let mut next = grid;
        pad_rows(&mut next);
        let previous = std::mem::replace(&mut self.state.grid, next);

        let mut report = MergeReport {
            replaced_all: true,
            rows_added: self.state.grid.len().saturating_sub(previous.len()),
            rows_removed: previous.len().saturating_sub(self.state.grid.len()),
            ..MergeReport::default()
        };

        self.state.prune_out_of_bounds();

        for row in 0..self.state.grid.len() {
            let new_row = row >= previous.len();
            for col in 0..self.state.grid[row].len() {
                let before = previous.get(row).and_then(|r| r.get(col)).map(|s| s.as_str());
                let changed = before.unwrap_or("") != self.state.grid[row][col];
                if new_row || changed {
                    self.state.set_tag(row, col, ProvenanceTag::Ai);
                    report.cells_tagged += 1;
                }
            }
            if !new_row && previous[row] != self.state.grid[row] {
                report.rows_updated += 1;
            }
        }

        log::info!(
            "chat replace: {} rows -> {} rows, {} cells changed",
            previous.len(),
            self.state.grid.len(),
            report.cells_tagged
        );
        report
    }
}

fn chat_source() -> SourceRef {
    SourceRef::new(SourceId::new(CHAT_SOURCE_ID), CHAT_SOURCE_LABEL)
}

/// Validate and store a row citation. Returns false when it was rejected.
fn record_citation(
    state: &mut DocumentState,
    row: usize,
    source: &SourceRef,
    citation: &Citation,
) -> bool {
    if let Err(e) = citation.validate() {
        log::warn!("row {row}: dropping citation from '{}': {e}", source.label);
        return false;
    }
    log::debug!("row {row}: citation from '{}': {}", source.label, citation.summary());
    state.citations.insert(
        row,
        RowCitation {
            origin_source_id: source.id.clone(),
            origin_label: source.label.clone(),
            citation: citation.clone(),
        },
    );
    true
}

/// Remove every contribution of `source` from `state`.
///
/// A row is owned by the source when any of its cells carries
/// `extraction:<id>`, or its citation originates from the source and the row
/// was not merely quoted by it. Owned rows are deleted. Cells tagged
/// `quote:<id>` on surviving rows are blanked and their quote citation
/// dropped.
fn clean_source(state: &mut DocumentState, source: &SourceId) -> RemovalSummary {
    let mut owned = BTreeSet::new();
    let mut quoted_cells = Vec::new();
    let mut quoted_rows = BTreeSet::new();

    for (key, tag) in &state.provenance {
        match tag {
            ProvenanceTag::Extraction(id) if id == source => {
                owned.insert(key.row);
            }
            ProvenanceTag::Quote(id) if id == source => {
                quoted_cells.push(*key);
                quoted_rows.insert(key.row);
            }
            _ => {}
        }
    }
    for (row, citation) in &state.citations {
        if &citation.origin_source_id == source && !quoted_rows.contains(row) {
            owned.insert(*row);
        }
    }

    let mut summary = RemovalSummary::default();
    for key in quoted_cells.into_iter().filter(|k| !owned.contains(&k.row)) {
        if state.cell(key.row, key.col).is_some() {
            state.write_cell(key.row, key.col, "");
        }
        state.provenance.remove(&key);
        summary.cells_cleared += 1;
    }
    for row in quoted_rows.iter().filter(|r| !owned.contains(*r)) {
        let from_source = state
            .citations
            .get(row)
            .map(|c| &c.origin_source_id == source)
            .unwrap_or(false);
        if from_source {
            state.citations.remove(row);
            summary.citations_removed += 1;
        }
    }

    summary.citations_removed += owned.iter().filter(|r| state.citations.contains_key(*r)).count();
    summary.rows_removed = state.remove_rows(&owned);
    summary
}

/// Locate the three quote columns by case-insensitive substring match,
/// appending any that are missing after the widest row so no existing cell
/// ends up under a quote header. Returns `[price/unit, net price, delivery]`.
fn ensure_quote_columns(state: &mut DocumentState, added: &mut Vec<String>) -> [usize; 3] {
    let mut resolved = [usize::MAX; 3];
    let mut claimed = BTreeSet::new();

    for (slot, (_, needles)) in QUOTE_COLUMNS.iter().enumerate() {
        let found = state.headers().iter().enumerate().find(|(i, header)| {
            let header = header.to_lowercase();
            !claimed.contains(i) && needles.iter().any(|n| header.contains(n))
        });
        if let Some((i, _)) = found {
            resolved[slot] = i;
            claimed.insert(i);
        }
    }

    if resolved.contains(&usize::MAX) {
        if state.grid.is_empty() {
            state.grid.push(Vec::new());
        }
        let widest = state.grid.iter().map(|r| r.len()).max().unwrap_or(0);
        state.grid[0].resize(widest, String::new());
    }
    for (slot, (title, _)) in QUOTE_COLUMNS.iter().enumerate() {
        if resolved[slot] == usize::MAX {
            state.grid[0].push(title.to_string());
            resolved[slot] = state.grid[0].len() - 1;
            added.push(title.to_string());
        }
    }
    if !added.is_empty() {
        pad_rows(&mut state.grid);
    }
    resolved
}

fn quote_citation(quote: &QuotedRow) -> Citation {
    let mut reasoning = quote.reasoning.trim().to_string();
    let pack = quote.pack_quantity.trim();
    if !gridassist_core::proposal::is_blank_or_sentinel(pack) {
        if !reasoning.is_empty() {
            reasoning.push(' ');
        }
        reasoning.push_str(&format!("Pack quantity: {pack}."));
    }
    let url = Some(quote.source_url.trim().to_string()).filter(|u| !u.is_empty());
    Citation::Api {
        endpoint: quote
            .source_domain()
            .unwrap_or_else(|| QUOTE_ENDPOINT_FALLBACK.to_string()),
        reasoning,
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridassist_core::grid::grid_from;

    fn bom() -> Document {
        Document::new(grid_from(&[
            &["Part", "Description", "Qty"][..],
            &["R1", "10k resistor", "4"][..],
            &["C1", "100nF cap", "2"][..],
        ]))
    }

    #[test]
    fn test_set_cell_same_value_is_noop() {
        let mut doc = bom();
        assert_eq!(doc.set_cell(1, 0, "R1"), Ok(false));
        assert!(!doc.can_undo());
        assert!(doc.tag(1, 0).is_none());
    }

    #[test]
    fn test_set_cell_tags_user_and_pads() {
        let mut doc = bom();
        assert_eq!(doc.set_cell(2, 4, "note"), Ok(true));
        assert_eq!(doc.grid()[2], vec!["C1", "100nF cap", "2", "", "note"]);
        assert_eq!(doc.tag(2, 4), Some(&ProvenanceTag::User));
        assert!(doc.can_undo());
    }

    #[test]
    fn test_set_cell_out_of_bounds() {
        let mut doc = bom();
        assert_eq!(
            doc.set_cell(7, 0, "x"),
            Err(EngineError::OutOfBounds { row: 7, rows: 3 })
        );
    }

    #[test]
    fn test_header_cells_are_editable() {
        let mut doc = bom();
        assert_eq!(doc.set_cell(0, 2, "Quantity"), Ok(true));
        assert_eq!(doc.grid()[0][2], "Quantity");
    }

    #[test]
    fn test_quote_columns_matched_case_insensitively() {
        let mut doc = Document::new(grid_from(&[
            &["Part", "UNIT PRICE (EUR)", "Total Net Price", "Lead time"][..],
            &["R1", "", "", ""][..],
        ]));
        let session = SourceRef::new(SourceId::new("q1"), "Quote run");
        let mut quote = QuotedRow::not_found(1, "found");
        quote.total_net_price = "4.00".into();
        quote.net_price_per_unit = "1.00".into();
        quote.estimated_delivery = "2 weeks".into();

        let report = doc.merge_quotes(&session, &[1], &[quote]);
        assert!(report.columns_added.is_empty());
        assert_eq!(doc.grid()[1], vec!["R1", "1.00", "4.00", "2 weeks"]);
    }

    #[test]
    fn test_reset_is_undoable() {
        let mut doc = bom();
        doc.set_cell(1, 2, "8").unwrap();
        doc.reset_to_original();
        assert_eq!(doc.grid()[1][2], "4");
        assert!(doc.tag(1, 2).is_none());
        assert!(doc.undo());
        assert_eq!(doc.grid()[1][2], "8");
    }

    #[test]
    fn test_chat_replace_rejects_empty_grid() {
        let mut doc = bom();
        let report = doc.merge_chat_replace(Vec::new());
        assert!(report.error.is_some());
        assert!(!doc.can_undo());
        assert_eq!(doc.grid().len(), 3);
    }

    #[test]
    fn test_undo_removal_restores_reference_file() {
        let mut doc = bom();
        let file = doc.add_reference_file("datasheet.pdf");
        doc.merge_extraction(&file.source_ref(), &[ExtractedRow::new(vec!["U1".into()])]);

        let summary = doc.remove_reference_file(&file.id).unwrap();
        assert_eq!(summary.rows_removed, 1);
        assert!(doc.reference_file(&file.id).is_none());

        assert!(doc.undo());
        assert_eq!(doc.grid()[3][0], "U1");
        assert_eq!(doc.reference_file(&file.id).map(|f| f.color()), Some(file.color()));
        assert_eq!(doc.highlight(3, 0), Some(file.color()));
        assert_eq!(doc.reference_files().count(), 1);

        assert!(doc.redo());
        assert_eq!(doc.grid().len(), 3);
        assert!(doc.reference_file(&file.id).is_none());
        assert_eq!(doc.reference_files().count(), 0);
    }

    #[test]
    fn test_highlight_follows_attached_file() {
        let mut doc = bom();
        let file = doc.add_reference_file("datasheet.pdf");
        doc.merge_extraction(&file.source_ref(), &[ExtractedRow::new(vec!["U1".into()])]);
        assert_eq!(doc.highlight(3, 0), Some(file.color()));
        assert_eq!(doc.highlight(1, 0), None);
    }
}
