// Grid shape helpers. Row 0 is the header row.

pub type Row = Vec<String>;
pub type Grid = Vec<Row>;

/// Number of header columns (0 for an empty grid).
pub fn header_len(grid: &[Row]) -> usize {
    grid.first().map(|h| h.len()).unwrap_or(0)
}

/// Pad every short row with empty cells up to the header length.
/// Rows longer than the header are left alone.
pub fn pad_rows(grid: &mut Grid) {
    let width = header_len(grid);
    for row in grid.iter_mut() {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }
}

/// Build a grid from string slices (tests and fixtures).
pub fn grid_from<S: AsRef<str>>(rows: &[&[S]]) -> Grid {
    rows.iter()
        .map(|r| r.iter().map(|c| c.as_ref().to_string()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_rows_never_truncates() {
        let mut grid = grid_from(&[
            &["Part", "Qty", "Price"][..],
            &["R1"][..],
            &["C1", "2", "0.1", "extra"][..],
        ]);
        pad_rows(&mut grid);
        assert_eq!(grid[1], vec!["R1", "", ""]);
        assert_eq!(grid[2].len(), 4);
    }

    #[test]
    fn test_header_len_empty() {
        assert_eq!(header_len(&[]), 0);
    }
}
