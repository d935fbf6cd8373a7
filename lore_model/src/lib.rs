//! # Lore Model
//!
//! The data model of a narrative universe: entities, relationships, timeline events
//! and the provenance attached to every one of them. This crate is the single source
//! of truth for what a consolidated fact looks like and contains no extraction or
//! reasoning logic.
//!
//! ## Invariants carried by the types
//!
//! - **Stable identity**: an [`EntityId`] is derived from `(kind, normalized name)` only
//! - **Provenance**: every attribute value, relationship and timeline event names the
//!   [`DocumentId`] that asserted it
//! - **Bounded confidence**: [`Confidence`] is always within `[0.0, 1.0]`

pub mod documents;
pub mod entities;
pub mod relations;
pub mod timeline;

pub use documents::*;
pub use entities::*;
pub use relations::*;
pub use timeline::*;
