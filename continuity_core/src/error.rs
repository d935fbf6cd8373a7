//! Error types for ingestion, graph mutation and persistence.

use lore_model::{DocumentId, EmptyDocumentId, EntityId};
use thiserror::Error;

/// Failure of a single oracle call. Both variants are transient and eligible for retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle call timed out after {0} ms")]
    Timeout(u64),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Failure to turn a document into an extraction bundle.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// Oracle output could not be parsed, even after repair and heuristic fallback.
    #[error("extraction parse error for document {document}")]
    Parse { document: DocumentId, raw: String },

    /// Oracle stayed unreachable after all retries.
    #[error("oracle unavailable after {attempts} attempt(s): {reason}")]
    OracleUnavailable { attempts: u32, reason: String },
}

/// Violations of the graph's structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("edge '{label}' references entity {missing} which is not in the registry")]
    ReferentialIntegrity { label: String, missing: EntityId },

    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

/// Failure of the oracle-backed rule check.
#[derive(Debug, Error)]
pub enum RuleCheckError {
    #[error(transparent)]
    Oracle(#[from] ExtractionError),

    #[error("malformed rule review: {0}")]
    MalformedReview(#[from] serde_json::Error),
}

/// Persistence and configuration failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed persisted state: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not persist state: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("invalid universe name {0:?}")]
    InvalidName(String),
}

/// Failure of a document ingestion. The universe is left exactly as it was before the call.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document {0} has already been ingested")]
    DuplicateDocument(DocumentId),

    #[error("document {0} is not part of this universe")]
    UnknownDocument(DocumentId),

    #[error("document {0} has no text")]
    EmptyDocument(DocumentId),

    #[error(transparent)]
    InvalidDocumentId(#[from] EmptyDocumentId),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    /// Raw oracle output attached to a parse failure, for diagnostics.
    pub fn raw_oracle_output(&self) -> Option<&str> {
        match self {
            IngestError::Extraction(ExtractionError::Parse { raw, .. }) => Some(raw),
            _ => None,
        }
    }

    /// Whether retrying the same ingestion later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IngestError::Extraction(ExtractionError::OracleUnavailable { .. })
        )
    }
}
