//! Provenance export: a deterministic, serializable view of who wrote what.
//!
//! - Cells sorted by (row, col), citations by row
//! - Summary counts keyed by the tag's display form
//! - Used for sidecar files next to an exported grid

use std::collections::BTreeMap;

use serde::Serialize;

use gridassist_core::{Citation, ProvenanceTag, SourceId};

use crate::document::Document;

/// Export format version. Bump on breaking changes.
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceExport {
    pub version: u32,
    pub exported_at: String,
    pub rows: usize,
    pub columns: usize,
    pub cells: Vec<TaggedCell>,
    pub citations: Vec<CitedRow>,
    pub summary: BTreeMap<String, usize>,
    /// Tagged cells written by a model rather than the user.
    pub ai_cells: usize,
    pub reference_files: Vec<ExportedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedCell {
    pub row: usize,
    pub col: usize,
    pub tag: ProvenanceTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitedRow {
    pub row: usize,
    pub origin_source_id: SourceId,
    pub origin_label: String,
    pub citation: Citation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub id: SourceId,
    pub display_name: String,
    pub color: String,
}

impl Document {
    pub fn export_provenance(&self) -> ProvenanceExport {
        let state = self.state();

        let cells: Vec<TaggedCell> = state
            .provenance
            .iter()
            .map(|(key, tag)| TaggedCell { row: key.row, col: key.col, tag: tag.clone() })
            .collect();

        let mut summary = BTreeMap::new();
        for cell in &cells {
            *summary.entry(cell.tag.to_string()).or_insert(0) += 1;
        }

        let ai_cells = cells.iter().filter(|c| c.tag.is_ai_generated()).count();

        let citations = state
            .citations
            .iter()
            .map(|(row, c)| CitedRow {
                row: *row,
                origin_source_id: c.origin_source_id.clone(),
                origin_label: c.origin_label.clone(),
                citation: c.citation.clone(),
            })
            .collect();

        let reference_files = self
            .reference_files()
            .map(|f| ExportedFile {
                id: f.id.clone(),
                display_name: f.display_name.clone(),
                color: format!("#{:06X}", f.color()),
            })
            .collect();

        ProvenanceExport {
            version: EXPORT_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            rows: state.grid.len(),
            columns: state.width(),
            cells,
            citations,
            summary,
            ai_cells,
            reference_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridassist_core::grid::grid_from;
    use gridassist_core::ExtractedRow;

    #[test]
    fn test_export_is_sorted_and_summarized() {
        let mut doc = Document::new(grid_from(&[&["Part", "Qty"][..], &["R1", "1"][..]]));
        doc.set_cell(1, 1, "3").unwrap();
        let file = doc.add_reference_file("bom.xlsx");
        doc.merge_extraction(
            &file.source_ref(),
            &[ExtractedRow::new(vec!["C9".into(), "2".into()]).with_citation(
                Citation::Spreadsheet { location: "Sheet1!A7".into(), reasoning: String::new() },
            )],
        );
        doc.set_cell(1, 0, "R2").unwrap();

        let export = doc.export_provenance();
        let positions: Vec<(usize, usize)> = export.cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(positions, vec![(1, 0), (1, 1), (2, 0), (2, 1)]);
        assert_eq!(export.summary["user"], 2);
        assert_eq!(export.summary[&format!("extraction:{}", file.id)], 2);
        assert_eq!(export.ai_cells, 2);
        assert_eq!(export.citations.len(), 1);
        assert_eq!(export.citations[0].row, 2);
        assert_eq!(export.reference_files[0].color, "#4E79A7");

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["citations"][0]["citation"]["type"], "spreadsheet");
    }
}
