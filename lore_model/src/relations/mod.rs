//! Directed relationships between entities.

use serde::{Deserialize, Serialize};

use crate::documents::DocumentId;
use crate::entities::{Confidence, EntityId};

/// A directed, labelled edge asserted by one document.
///
/// Parallel edges between the same pair are allowed when their labels or sources differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: EntityId,
    pub target: EntityId,
    pub label: String,
    pub document: DocumentId,
    pub confidence: Confidence,
}

impl Relationship {
    pub fn new(
        source: EntityId,
        target: EntityId,
        label: impl Into<String>,
        document: DocumentId,
        confidence: Confidence,
    ) -> Self {
        Self {
            source,
            target,
            label: normalize_label(&label.into()),
            document,
            confidence,
        }
    }

    /// Whether this edge and `other` state the same fact from the same document.
    pub fn same_assertion(&self, other: &Relationship) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.label == other.label
            && self.document == other.document
    }

    /// Check if the edge touches `entity` at either end.
    pub fn touches(&self, entity: EntityId) -> bool {
        self.source == entity || self.target == entity
    }
}

/// Relation labels are stored in `snake_case` so `"Located In"` and `located_in` match.
pub fn normalize_label(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;

    #[test]
    fn test_label_normalization() {
        assert_eq!(normalize_label("Located In"), "located_in");
        assert_eq!(normalize_label("member-of"), "member_of");
        assert_eq!(normalize_label("enemy_of"), "enemy_of");
    }

    #[test]
    fn test_same_assertion() {
        let aria = EntityId::derive(EntityKind::Character, "Aria");
        let forest = EntityId::derive(EntityKind::Location, "Forest");
        let d1 = DocumentId::new("D1").unwrap();

        let a = Relationship::new(aria, forest, "located_in", d1.clone(), Confidence::new(0.9));
        let b = Relationship::new(aria, forest, "Located In", d1, Confidence::new(0.4));
        assert!(a.same_assertion(&b));
        assert!(a.touches(forest));
    }
}
