//! `gridassist-core`: shared data types for the AI-assisted grid editor.
//!
//! Everything here is plain data. The engine owns mutation, the AI crate owns
//! the network; both speak in these types.

pub mod citation;
pub mod grid;
pub mod palette;
pub mod proposal;
pub mod provenance;

pub use citation::{Citation, CitationError, RowCitation};
pub use grid::{Grid, Row};
pub use proposal::{ChatRow, ExtractedRow, QuotedRow, NOT_FOUND};
pub use provenance::{CellKey, ProvenanceTag, SourceId, SourceRef};
