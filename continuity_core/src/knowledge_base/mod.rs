//! Knowledge Base module - the consolidated state of a universe.
//!
//! The knowledge graph consists of:
//! - **Entity Registry**: entities keyed by stable identity, with provenance and confidence
//! - **Relationship Graph**: directed multi-edges between registered entities
//! - **Timeline Store**: per-entity events kept in timestamp order

mod graph;
mod registry;
mod relations;
mod timeline;

pub use graph::*;
pub use registry::*;
pub use relations::*;
pub use timeline::*;
