// Cell provenance: who or what last wrote a cell.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of a contribution source (a reference file or a
/// quoting session). Generated once and never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id (UUID v4, simple form).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A source id together with the label shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: SourceId,
    pub label: String,
}

impl SourceRef {
    pub fn new(id: SourceId, label: impl Into<String>) -> Self {
        Self { id, label: label.into() }
    }
}

/// Composite provenance key. Row 0 is the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub row: usize,
    pub col: usize,
}

impl CellKey {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Provenance tag attached to a single cell.
///
/// A cell with no tag is pristine (as loaded from the main file).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProvenanceTag {
    /// Manual edit.
    User,
    /// Conversational assistant edit or addition.
    Ai,
    /// Row extracted from a reference file.
    Extraction(SourceId),
    /// Price/delivery value written by a quoting session.
    Quote(SourceId),
}

impl ProvenanceTag {
    /// The source this tag belongs to, if any.
    pub fn source(&self) -> Option<&SourceId> {
        match self {
            ProvenanceTag::User | ProvenanceTag::Ai => None,
            ProvenanceTag::Extraction(id) | ProvenanceTag::Quote(id) => Some(id),
        }
    }

    /// True for anything a model produced (chat, extraction or quoting).
    pub fn is_ai_generated(&self) -> bool {
        !matches!(self, ProvenanceTag::User)
    }
}

impl fmt::Display for ProvenanceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvenanceTag::User => f.write_str("user"),
            ProvenanceTag::Ai => f.write_str("ai"),
            ProvenanceTag::Extraction(id) => write!(f, "extraction:{id}"),
            ProvenanceTag::Quote(id) => write!(f, "quote:{id}"),
        }
    }
}

impl FromStr for ProvenanceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => return Ok(ProvenanceTag::User),
            "ai" => return Ok(ProvenanceTag::Ai),
            _ => {}
        }
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("unknown provenance tag: {s}"))?;
        if id.is_empty() {
            return Err(format!("provenance tag '{s}' has an empty source id"));
        }
        match kind {
            "extraction" => Ok(ProvenanceTag::Extraction(SourceId::new(id))),
            "quote" => Ok(ProvenanceTag::Quote(SourceId::new(id))),
            _ => Err(format!("unknown provenance tag: {s}")),
        }
    }
}

impl Serialize for ProvenanceTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProvenanceTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
