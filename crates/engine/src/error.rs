use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Row index past the end of the grid.
    OutOfBounds { row: usize, rows: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { row, rows } => {
                write!(f, "row {row} is out of bounds (grid has {rows} rows)")
            }
        }
    }
}

impl std::error::Error for EngineError {}
