//! Source documents and provenance identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document id must not be empty")]
pub struct EmptyDocumentId;

/// Identifier of a source document within a universe. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyDocumentId> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(EmptyDocumentId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = EmptyDocumentId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bookkeeping for an ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,

    /// Human-readable source name (title, file name).
    pub name: String,

    /// Source category used by the canon hierarchy (e.g. `primary_novel`, `fan_theories`).
    pub category: Option<String>,

    /// Processing order within the universe. Strictly increasing, never reused.
    pub ordinal: u64,

    pub ingested_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(id: DocumentId, name: impl Into<String>, category: Option<String>, ordinal: u64) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            ordinal,
            ingested_at: Utc::now(),
        }
    }
}
