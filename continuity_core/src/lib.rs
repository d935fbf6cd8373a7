//! # Continuity Core
//!
//! The consolidation engine for narrative universes. This crate turns source documents
//! into a knowledge graph through an external extraction oracle, merges every document's
//! facts under stable entity identities, and reasons over the merged graph to surface
//! contradictions, canon choices and speculation boundaries.
//!
//! ## Core Components
//!
//! - **extraction**: Oracle boundary, chunking and tolerant parsing of oracle output
//! - **knowledge_base**: Entity registry, relationship graph and timeline store
//! - **merge**: Per-document commits and the advisory cross-document reconciliation
//! - **contradiction**: Location, timeline, attribute and world-rule checks
//! - **canon**: Source-hierarchy resolution between conflicting facts
//! - **speculation**: Confidence bands over the current graph
//! - **subgraph**: Bounded neighborhoods around one entity
//! - **universe**: Persistence and the single-writer, snapshot-reader handle
//!
//! ## Design Philosophy
//!
//! - **Provenance First**: Every fact names the document that asserted it; nothing is overwritten
//! - **Derived Findings**: Contradictions and reconciled views are recomputed, never stored
//! - **Isolated Oracle**: All non-deterministic work sits behind [`ExtractionOracle`]

pub mod canon;
pub mod config;
pub mod contradiction;
pub mod error;
pub mod extraction;
pub mod knowledge_base;
pub mod merge;
pub mod speculation;
pub mod subgraph;
pub mod universe;

pub use canon::*;
pub use config::*;
pub use contradiction::*;
pub use error::*;
pub use extraction::*;
pub use knowledge_base::*;
pub use merge::*;
pub use speculation::*;
pub use subgraph::*;
pub use universe::*;
