//! The owned document aggregate: grid + provenance + row citations.
//!
//! Provenance and citations are keyed by row index, so any row removal must
//! go through [`DocumentState::remove_rows`], which renumbers all three in
//! one pass.

use std::collections::{BTreeMap, BTreeSet};

use gridassist_core::grid::{header_len, pad_rows};
use gridassist_core::{CellKey, Grid, ProvenanceTag, RowCitation};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentState {
    pub grid: Grid,
    pub provenance: BTreeMap<CellKey, ProvenanceTag>,
    pub citations: BTreeMap<usize, RowCitation>,
}

impl DocumentState {
    /// Pristine state for a freshly loaded grid (no tags, no citations).
    pub fn from_grid(mut grid: Grid) -> Self {
        pad_rows(&mut grid);
        Self {
            grid,
            provenance: BTreeMap::new(),
            citations: BTreeMap::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        self.grid.first().map(|h| h.as_slice()).unwrap_or(&[])
    }

    pub fn width(&self) -> usize {
        header_len(&self.grid)
    }

    /// Number of data rows (header excluded).
    pub fn data_row_count(&self) -> usize {
        self.grid.len().saturating_sub(1)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.grid.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    pub fn tag(&self, row: usize, col: usize) -> Option<&ProvenanceTag> {
        self.provenance.get(&CellKey::new(row, col))
    }

    /// Replace whatever tag the cell had.
    pub fn set_tag(&mut self, row: usize, col: usize, tag: ProvenanceTag) {
        self.provenance.insert(CellKey::new(row, col), tag);
    }

    pub fn citation(&self, row: usize) -> Option<&RowCitation> {
        self.citations.get(&row)
    }

    /// Write a cell, growing the row if needed. A write past the header
    /// width grows the header with unlabeled columns and pads every row, so
    /// every cell sits under a header slot. Does not touch provenance.
    pub(crate) fn write_cell(&mut self, row: usize, col: usize, value: &str) {
        let past_header = col >= self.width();
        if past_header {
            self.grid[0].resize(col + 1, String::new());
        }
        let cells = &mut self.grid[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.to_string();
        if past_header {
            pad_rows(&mut self.grid);
        }
    }

    /// Append a data row padded to the header width; returns its index.
    pub(crate) fn push_row(&mut self, mut data: Vec<String>) -> usize {
        let width = self.width();
        if data.len() < width {
            data.resize(width, String::new());
        }
        self.grid.push(data);
        self.grid.len() - 1
    }

    /// Remove the given data rows and close the gap: every surviving row,
    /// its provenance keys and its citation move down by the number of
    /// removed rows above it. Row 0 is never removed.
    pub(crate) fn remove_rows(&mut self, rows: &BTreeSet<usize>) -> usize {
        let doomed: BTreeSet<usize> = rows
            .iter()
            .copied()
            .filter(|&r| r > 0 && r < self.grid.len())
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let shift = |row: usize| row - doomed.range(..row).count();

        let mut index = 0;
        self.grid.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });

        self.provenance = std::mem::take(&mut self.provenance)
            .into_iter()
            .filter(|(key, _)| !doomed.contains(&key.row))
            .map(|(key, tag)| (CellKey::new(shift(key.row), key.col), tag))
            .collect();

        self.citations = std::mem::take(&mut self.citations)
            .into_iter()
            .filter(|(row, _)| !doomed.contains(row))
            .map(|(row, citation)| (shift(row), citation))
            .collect();

        doomed.len()
    }

    /// Drop provenance and citations that point outside the grid.
    pub(crate) fn prune_out_of_bounds(&mut self) {
        let grid = &self.grid;
        self.provenance
            .retain(|key, _| grid.get(key.row).map(|r| key.col < r.len()).unwrap_or(false));
        let rows = grid.len();
        self.citations.retain(|row, _| *row < rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridassist_core::grid::grid_from;
    use gridassist_core::{Citation, SourceId};

    fn cite(origin: &str) -> RowCitation {
        RowCitation {
            origin_source_id: SourceId::new(origin),
            origin_label: origin.to_string(),
            citation: Citation::Document { page: None, quote: "q".into() },
        }
    }

    #[test]
    fn test_remove_rows_shifts_keys() {
        let mut state = DocumentState::from_grid(grid_from(&[
            &["A", "B"][..],
            &["1", "x"][..],
            &["2", "y"][..],
            &["3", "z"][..],
            &["4", "w"][..],
        ]));
        state.set_tag(2, 0, ProvenanceTag::User);
        state.set_tag(4, 1, ProvenanceTag::Ai);
        state.citations.insert(4, cite("f"));
        state.citations.insert(3, cite("g"));

        let removed = state.remove_rows(&[1, 3].into_iter().collect());
        assert_eq!(removed, 2);
        assert_eq!(state.grid, grid_from(&[&["A", "B"][..], &["2", "y"][..], &["4", "w"][..]]));
        assert_eq!(state.tag(1, 0), Some(&ProvenanceTag::User));
        assert_eq!(state.tag(2, 1), Some(&ProvenanceTag::Ai));
        assert_eq!(state.citations.len(), 1);
        assert_eq!(state.citation(2).unwrap().origin_source_id.as_str(), "f");
    }

    #[test]
    fn test_header_is_never_removed() {
        let mut state = DocumentState::from_grid(grid_from(&[&["A"][..], &["1"][..]]));
        let removed = state.remove_rows(&[0, 1, 9].into_iter().collect());
        assert_eq!(removed, 1);
        assert_eq!(state.grid.len(), 1);
    }

    #[test]
    fn test_write_past_header_grows_header() {
        let mut state = DocumentState::from_grid(grid_from(&[
            &["A", "B"][..],
            &["1", "x"][..],
            &["2", "y"][..],
        ]));
        state.write_cell(2, 3, "note");
        assert_eq!(state.grid[0], vec!["A", "B", "", ""]);
        assert_eq!(state.grid[1], vec!["1", "x", "", ""]);
        assert_eq!(state.grid[2], vec!["2", "y", "", "note"]);
    }

    #[test]
    fn test_push_row_pads_to_header() {
        let mut state = DocumentState::from_grid(grid_from(&[&["A", "B", "C"][..]]));
        let row = state.push_row(vec!["only".into()]);
        assert_eq!(row, 1);
        assert_eq!(state.grid[1], vec!["only", "", ""]);
    }
}
