//! Knowledge Graph - the per-universe aggregate of registry, relationships and timelines.

use lore_model::{DocumentId, DocumentRecord, Entity, EntityId, EntityKind, VersionSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{EntityRegistry, RelationshipGraph, TimelineStore};
use crate::error::GraphError;

/// The complete consolidated state of one universe.
///
/// Values of this type are treated as immutable snapshots once published; writers
/// mutate a private clone and swap it in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub(crate) entities: EntityRegistry,
    pub(crate) relationships: RelationshipGraph,
    pub(crate) timelines: TimelineStore,

    /// Ingested documents by id.
    documents: BTreeMap<DocumentId, DocumentRecord>,

    /// Ordinal handed to the next ingested document.
    next_ordinal: u64,
}

/// What a cascade removal of one document changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalSummary {
    pub entities_removed: usize,
    pub entities_updated: usize,
    pub relationships_removed: usize,
    pub timeline_events_removed: usize,
}

/// Size of the graph, broken down by entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    pub timeline_event_count: usize,
    pub document_count: usize,
    pub entities_by_kind: BTreeMap<EntityKind, usize>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn relationships(&self) -> &RelationshipGraph {
        &self.relationships
    }

    pub fn timelines(&self) -> &TimelineStore {
        &self.timelines
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Record a new document and assign it the next processing ordinal.
    pub fn register_document(
        &mut self,
        id: DocumentId,
        name: impl Into<String>,
        category: Option<String>,
    ) -> DocumentRecord {
        let record = DocumentRecord::new(id.clone(), name, category, self.next_ordinal);
        self.next_ordinal += 1;
        self.documents.insert(id, record.clone());
        record
    }

    pub fn has_document(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    pub fn document(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.documents.get(id)
    }

    pub fn document_records(&self) -> &BTreeMap<DocumentId, DocumentRecord> {
        &self.documents
    }

    /// Documents in processing order.
    pub fn documents_in_order(&self) -> Vec<&DocumentRecord> {
        let mut records: Vec<_> = self.documents.values().collect();
        records.sort_by_key(|r| r.ordinal);
        records
    }

    /// Remove everything `id` contributed.
    ///
    /// Entities left with no contributing document are deleted along with their edges and
    /// timelines; surviving entities get their confidence recomputed. Returns `None` if the
    /// document was never ingested.
    pub fn remove_document(&mut self, id: &DocumentId) -> Option<RemovalSummary> {
        self.documents.remove(id)?;

        let mut summary = RemovalSummary {
            relationships_removed: self.relationships.remove_document(id),
            timeline_events_removed: self.timelines.remove_document(id),
            ..Default::default()
        };

        let mut orphaned = Vec::new();
        for entity in self.entities.iter_mut().filter(|e| e.is_mentioned_by(id)) {
            if entity.forget_source(id) {
                orphaned.push(entity.id);
            } else {
                summary.entities_updated += 1;
            }
        }

        for entity_id in orphaned {
            self.entities.remove(entity_id);
            summary.relationships_removed += self.relationships.remove_entity(entity_id);
            summary.timeline_events_removed += self.timelines.remove_entity(entity_id);
            summary.entities_removed += 1;
        }

        Some(summary)
    }

    /// Store an alternate version of an entity without touching its primary record.
    pub fn record_version(
        &mut self,
        entity: EntityId,
        label: impl Into<String>,
        snapshot: VersionSnapshot,
    ) -> Result<(), GraphError> {
        self.entities
            .get_mut(entity)
            .ok_or(GraphError::UnknownEntity(entity))?
            .record_version(label, snapshot);
        Ok(())
    }

    /// Verify that every edge and timeline points at a registered entity.
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        for edge in self.relationships.iter() {
            for endpoint in [edge.source, edge.target] {
                if !self.entities.contains(endpoint) {
                    return Err(GraphError::ReferentialIntegrity {
                        label: edge.label.clone(),
                        missing: endpoint,
                    });
                }
            }
        }
        for (owner, _) in self.timelines.iter() {
            if !self.entities.contains(owner) {
                return Err(GraphError::UnknownEntity(owner));
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> GraphStats {
        let mut entities_by_kind = BTreeMap::new();
        for entity in self.entities.iter() {
            *entities_by_kind.entry(entity.kind).or_default() += 1;
        }
        GraphStats {
            entity_count: self.entities.len(),
            relationship_count: self.relationships.len(),
            timeline_event_count: self.timelines.event_count(),
            document_count: self.documents.len(),
            entities_by_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_model::{AttributeValue, Confidence, Relationship, Timestamp, TimelineEvent};

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    /// Aria appears in D1 and D2; Forest only in D1; Castle only in D2.
    fn two_document_graph() -> (KnowledgeGraph, EntityId, EntityId, EntityId) {
        let mut graph = KnowledgeGraph::new();
        graph.register_document(doc("D1"), "Book One", Some("primary_novel".into()));
        graph.register_document(doc("D2"), "Fan Wiki", Some("fan_theories".into()));

        let aria = graph.entities.upsert(EntityKind::Character, "Aria", &doc("D1"), Confidence::new(0.9)).id();
        graph.entities.upsert(EntityKind::Character, "Aria", &doc("D2"), Confidence::new(0.6));
        let forest = graph.entities.upsert(EntityKind::Location, "Forest", &doc("D1"), Confidence::new(0.9)).id();
        let castle = graph.entities.upsert(EntityKind::Location, "Castle", &doc("D2"), Confidence::new(0.6)).id();

        graph
            .relationships
            .insert(Relationship::new(aria, forest, "located_in", doc("D1"), Confidence::new(0.9)), &graph.entities)
            .unwrap();
        graph
            .relationships
            .insert(Relationship::new(aria, castle, "located_in", doc("D2"), Confidence::new(0.6)), &graph.entities)
            .unwrap();
        graph.timelines.insert(
            aria,
            TimelineEvent::new("Leaves home", Timestamp::Ordinal(1), doc("D1"), Confidence::new(0.9)),
        );
        if let Some(entity) = graph.entities.get_mut(aria) {
            entity.add_attribute("eye_color", AttributeValue::new("blue", doc("D1"), Confidence::new(0.9)));
        }

        (graph, aria, forest, castle)
    }

    #[test]
    fn test_register_document_ordinals() {
        let (graph, ..) = two_document_graph();
        let order: Vec<_> = graph.documents_in_order().iter().map(|r| r.ordinal).collect();
        assert_eq!(order, vec![0, 1]);
        assert!(graph.has_document(&doc("D1")));
    }

    #[test]
    fn test_remove_document_cascades() {
        let (mut graph, aria, forest, castle) = two_document_graph();

        let summary = graph.remove_document(&doc("D1")).unwrap();

        assert_eq!(summary.entities_removed, 1);
        assert_eq!(summary.entities_updated, 1);
        assert_eq!(summary.relationships_removed, 1);
        assert_eq!(summary.timeline_events_removed, 1);

        assert!(graph.entity(forest).is_none());
        assert!(graph.entity(castle).is_some());
        let survivor = graph.entity(aria).unwrap();
        assert_eq!(survivor.confidence, Confidence::new(0.6));
        assert!(survivor.attribute("eye_color").is_empty());
        assert!(graph.check_integrity().is_ok());
    }

    #[test]
    fn test_remove_unknown_document() {
        let (mut graph, ..) = two_document_graph();
        assert!(graph.remove_document(&doc("D9")).is_none());
        assert_eq!(graph.stats().document_count, 2);
    }

    #[test]
    fn test_ordinals_not_reused_after_removal() {
        let (mut graph, ..) = two_document_graph();
        graph.remove_document(&doc("D2"));
        let record = graph.register_document(doc("D3"), "Later", None);
        assert_eq!(record.ordinal, 2);
    }

    #[test]
    fn test_stats() {
        let (graph, ..) = two_document_graph();
        let stats = graph.stats();
        assert_eq!(stats.entity_count, 3);
        assert_eq!(stats.relationship_count, 2);
        assert_eq!(stats.timeline_event_count, 1);
        assert_eq!(stats.entities_by_kind[&EntityKind::Location], 2);
    }

    #[test]
    fn test_record_version_unknown_entity() {
        let (mut graph, aria, ..) = two_document_graph();
        let ghost = EntityId::derive(EntityKind::Character, "Ghost");

        assert_eq!(
            graph.record_version(ghost, "alt", VersionSnapshot::new()),
            Err(GraphError::UnknownEntity(ghost))
        );
        assert!(graph.record_version(aria, "alt", VersionSnapshot::new()).is_ok());
        assert!(graph.entity(aria).unwrap().versions.contains_key("alt"));
    }

    #[test]
    fn test_serde_round_trip_preserves_state() {
        let (graph, aria, ..) = two_document_graph();
        let json = serde_json::to_string(&graph).unwrap();
        let restored: KnowledgeGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.stats(), graph.stats());
        assert_eq!(restored.timelines().events(aria).len(), 1);
        assert!(restored.check_integrity().is_ok());
    }
}
