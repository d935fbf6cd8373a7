//! Entity definitions for a narrative universe.

mod confidence;
mod entity;

pub use confidence::*;
pub use entity::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving entity ids. Changing it would re-key every persisted universe.
const ENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6c6f_7265_2d6d_6f64_656c_2d65_6e74_6974);

/// Unique identifier for all entities in a universe.
///
/// Derived deterministically from the entity kind and its normalized name, so
/// reprocessing identical input always yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Derive the id for an entity of `kind` called `name`.
    pub fn derive(kind: EntityKind, name: &str) -> Self {
        let key = format!("{}:{}", kind.as_str(), normalize_name(name));
        Self(Uuid::new_v5(&ENTITY_NAMESPACE, key.as_bytes()))
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Trim, collapse internal whitespace and lower-case a name.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Kinds of entities in a narrative universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Location,
    Object,
    Rule,
    Event,
    Organization,
    Other,
}

impl EntityKind {
    /// Map a free-form type label (as produced by extractors and NER taggers) onto a kind.
    pub fn from_label(label: &str) -> Self {
        match normalize_name(label).replace([' ', '-'], "_").as_str() {
            "character" | "person" | "people" | "creature" | "species" => EntityKind::Character,
            "location" | "place" | "gpe" | "loc" | "setting" | "realm" => EntityKind::Location,
            "object" | "item" | "artifact" | "artefact" | "weapon" => EntityKind::Object,
            "rule" | "world_rule" | "law" | "system" | "ability" => EntityKind::Rule,
            "event" | "timeline_event" | "battle" => EntityKind::Event,
            "organization" | "organisation" | "org" | "faction" | "group" | "norp" => {
                EntityKind::Organization
            }
            _ => EntityKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Location => "location",
            EntityKind::Object => "object",
            EntityKind::Rule => "rule",
            EntityKind::Event => "event",
            EntityKind::Organization => "organization",
            EntityKind::Other => "other",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
