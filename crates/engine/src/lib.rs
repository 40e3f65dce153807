//! `gridassist-engine`: owns the grid, its per-cell provenance and per-row
//! citations, and every operation that mutates them.
//!
//! No IO and no network: adapters hand in proposals, the engine applies them.

pub mod document;
pub mod error;
pub mod export;
pub mod history;
pub mod reference;
pub mod state;

pub use document::{Document, MergeReport, RemovalSummary, CHAT_SOURCE_ID, CHAT_SOURCE_LABEL};
pub use error::EngineError;
pub use export::ProvenanceExport;
pub use history::{History, MAX_HISTORY_DEPTH};
pub use reference::ReferenceFile;
pub use state::DocumentState;
