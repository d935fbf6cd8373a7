//! Consolidated entity records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{normalize_name, Confidence, EntityId, EntityKind};
use crate::documents::DocumentId;

/// One asserted value of an entity attribute, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value: String,
    pub source: DocumentId,
    pub confidence: Confidence,
}

impl AttributeValue {
    pub fn new(value: impl Into<String>, source: DocumentId, confidence: Confidence) -> Self {
        Self {
            value: value.into(),
            source,
            confidence,
        }
    }

    /// Key used when deciding whether two values disagree.
    pub fn comparison_key(&self) -> String {
        normalize_name(&self.value)
    }
}

/// An alternate attribute snapshot (alternate timeline, reboot, retcon).
pub type VersionSnapshot = BTreeMap<String, String>;

/// A narrative entity consolidated from one or more documents.
///
/// Attribute values are appended, never overwritten, so conflicting statements stay
/// visible to the contradiction checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub canonical_name: String,

    /// Attribute name -> every value asserted for it, in insertion order.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<AttributeValue>>,

    /// Documents that mentioned this entity, with their strongest mention confidence.
    #[serde(default)]
    pub sources: BTreeMap<DocumentId, Confidence>,

    /// Aggregate confidence: maximum over all contributing mentions.
    pub confidence: Confidence,

    /// Deliberate variants, never merged into the primary record.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionSnapshot>,
}

impl Entity {
    /// Create a new entity with no sources yet.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        let canonical_name = name.into().trim().to_string();
        Self {
            id: EntityId::derive(kind, &canonical_name),
            kind,
            canonical_name,
            attributes: BTreeMap::new(),
            sources: BTreeMap::new(),
            confidence: Confidence::ZERO,
            versions: BTreeMap::new(),
        }
    }

    /// Record a mention by `source`. Confidence never decreases.
    pub fn mention(&mut self, source: &DocumentId, confidence: Confidence) {
        let entry = self.sources.entry(source.clone()).or_insert(confidence);
        *entry = (*entry).aggregate(confidence);
        self.confidence = self.confidence.aggregate(confidence);
    }

    /// Append an attribute value. An identical value from the same source is collapsed
    /// into the existing record, keeping the higher confidence.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        let values = self.attributes.entry(name.into()).or_default();
        if let Some(existing) = values
            .iter_mut()
            .find(|v| v.source == value.source && v.value == value.value)
        {
            existing.confidence = existing.confidence.aggregate(value.confidence);
        } else {
            values.push(value);
        }
    }

    /// All values recorded for an attribute.
    pub fn attribute(&self, name: &str) -> &[AttributeValue] {
        self.attributes.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Distinct values of an attribute, first occurrence of each.
    pub fn distinct_values(&self, name: &str) -> Vec<&AttributeValue> {
        let mut seen = Vec::new();
        let mut distinct = Vec::new();
        for value in self.attribute(name) {
            let key = value.comparison_key();
            if !seen.contains(&key) {
                seen.push(key);
                distinct.push(value);
            }
        }
        distinct
    }

    /// Check whether a document mentioned this entity.
    pub fn is_mentioned_by(&self, source: &DocumentId) -> bool {
        self.sources.contains_key(source)
    }

    /// Iterate over the ids of contributing documents.
    pub fn source_ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.sources.keys()
    }

    /// Drop everything `source` contributed and recompute the aggregate confidence.
    ///
    /// Returns `true` when no contributing document remains.
    pub fn forget_source(&mut self, source: &DocumentId) -> bool {
        self.sources.remove(source);
        for values in self.attributes.values_mut() {
            values.retain(|v| &v.source != source);
        }
        self.attributes.retain(|_, values| !values.is_empty());
        self.confidence = self
            .sources
            .values()
            .copied()
            .fold(Confidence::ZERO, Confidence::aggregate);
        self.sources.is_empty()
    }

    /// Store an alternate snapshot under `label`, replacing an earlier one with that label.
    pub fn record_version(&mut self, label: impl Into<String>, snapshot: VersionSnapshot) {
        self.versions.insert(label.into(), snapshot);
    }
}
