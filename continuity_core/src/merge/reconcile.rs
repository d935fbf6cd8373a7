//! Cross-document reconciliation: an advisory, canon-resolved view of disputed facts.

use lore_model::{AttributeValue, EntityId, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canon::{CanonRanking, CanonResolver};
use crate::knowledge_base::KnowledgeGraph;

/// The canonical choice for one disputed attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledAttribute {
    pub name: String,
    pub chosen: AttributeValue,
    /// Values that disagree with the chosen one, first occurrence of each.
    pub overruled: Vec<AttributeValue>,
}

/// The canonical choice among edges with one label that point at different targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRelation {
    pub label: String,
    pub chosen: Relationship,
    pub overruled: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledEntity {
    pub id: EntityId,
    pub name: String,
    pub attributes: Vec<ReconciledAttribute>,
    pub relations: Vec<ReconciledRelation>,
}

/// Canon-resolved view of every entity that appears in two or more documents and has
/// disputed facts. Building it never modifies the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciledView {
    pub entities: Vec<ReconciledEntity>,
}

impl ReconciledView {
    /// Reconcile `graph` under `ranking`.
    ///
    /// Edges are only treated as disputed for labels in `exclusive_labels`, where an entity
    /// can hold a single target at a time.
    pub fn build(graph: &KnowledgeGraph, ranking: &CanonRanking, exclusive_labels: &[String]) -> Self {
        let resolver = CanonResolver::new(ranking, graph.document_records());
        let mut entities = Vec::new();

        for entity in graph.entities().iter().filter(|e| e.sources.len() >= 2) {
            let mut attributes = Vec::new();
            for (name, values) in &entity.attributes {
                if entity.distinct_values(name).len() < 2 {
                    continue;
                }
                let Some(chosen) = resolver.resolve_all(values) else {
                    continue;
                };
                let overruled = entity
                    .distinct_values(name)
                    .into_iter()
                    .filter(|v| v.comparison_key() != chosen.comparison_key())
                    .cloned()
                    .collect();
                attributes.push(ReconciledAttribute {
                    name: name.clone(),
                    chosen: chosen.clone(),
                    overruled,
                });
            }

            let mut by_label: BTreeMap<&str, Vec<&Relationship>> = BTreeMap::new();
            for edge in graph.relationships().outgoing(entity.id) {
                if exclusive_labels.iter().any(|l| l == &edge.label) {
                    by_label.entry(edge.label.as_str()).or_default().push(edge);
                }
            }
            let mut relations = Vec::new();
            for (label, edges) in by_label {
                let Some(first) = edges.first() else {
                    continue;
                };
                if edges.iter().all(|e| e.target == first.target) {
                    continue;
                }
                let Some(chosen) = resolver.resolve_all(edges.iter().copied()) else {
                    continue;
                };
                relations.push(ReconciledRelation {
                    label: label.to_string(),
                    chosen: chosen.clone(),
                    overruled: edges
                        .iter()
                        .filter(|e| e.target != chosen.target)
                        .map(|e| (*e).clone())
                        .collect(),
                });
            }

            if !attributes.is_empty() || !relations.is_empty() {
                entities.push(ReconciledEntity {
                    id: entity.id,
                    name: entity.canonical_name.clone(),
                    attributes,
                    relations,
                });
            }
        }

        Self { entities }
    }

    pub fn entity(&self, id: EntityId) -> Option<&ReconciledEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{parse_strict, ExtractionBundle, ParseStage};
    use crate::merge::MergeEngine;
    use lore_model::{DocumentId, EntityKind};

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    fn ingest(graph: &mut KnowledgeGraph, id: &str, category: &str, json: &str) {
        graph.register_document(doc(id), id, Some(category.to_string()));
        let output = parse_strict(json).unwrap();
        let bundle = ExtractionBundle::from_outputs(doc(id), &[(output, ParseStage::Strict)]);
        MergeEngine::commit(graph, &doc(id), &bundle).unwrap();
    }

    fn disputed_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        ingest(
            &mut graph,
            "D1",
            "primary_novel",
            r#"{"entities": [{"name": "Aria", "type": "character", "attributes": {"eye_color": "blue"}, "confidence": 0.6},
                             {"name": "Forest", "type": "location", "confidence": 0.9}],
                "relationships": [{"source": "Aria", "target": "Forest", "relationship": "located_in", "confidence": 0.6}]}"#,
        );
        ingest(
            &mut graph,
            "D2",
            "fan_theories",
            r#"{"entities": [{"name": "Aria", "type": "character", "attributes": {"eye_color": "green"}, "confidence": 0.95},
                             {"name": "Castle", "type": "location", "confidence": 0.9}],
                "relationships": [{"source": "Aria", "target": "Castle", "relationship": "located_in", "confidence": 0.95}]}"#,
        );
        graph
    }

    fn ranking() -> CanonRanking {
        CanonRanking::new([("primary_novel".to_string(), 1), ("fan_theories".to_string(), 10)].into())
    }

    #[test]
    fn test_canon_wins_disputed_attribute() {
        let graph = disputed_graph();
        let view = ReconciledView::build(&graph, &ranking(), &["located_in".to_string()]);

        let aria = view.entity(EntityId::derive(EntityKind::Character, "Aria")).unwrap();
        assert_eq!(aria.attributes[0].name, "eye_color");
        assert_eq!(aria.attributes[0].chosen.value, "blue");
        assert_eq!(aria.attributes[0].overruled[0].value, "green");

        let located = &aria.relations[0];
        assert_eq!(located.chosen.target, EntityId::derive(EntityKind::Location, "Forest"));
        assert_eq!(located.overruled.len(), 1);
    }

    #[test]
    fn test_view_does_not_mutate_graph() {
        let graph = disputed_graph();
        let before = serde_json::to_string(&graph).unwrap();

        ReconciledView::build(&graph, &ranking(), &[]);

        assert_eq!(serde_json::to_string(&graph).unwrap(), before);
        let aria = graph.entity(EntityId::derive(EntityKind::Character, "Aria")).unwrap();
        assert_eq!(aria.attribute("eye_color").len(), 2);
    }

    #[test]
    fn test_single_source_entities_are_skipped() {
        let mut graph = KnowledgeGraph::new();
        ingest(
            &mut graph,
            "D1",
            "primary_novel",
            r#"{"entities": [{"name": "Aria", "type": "character", "attributes": {"eye_color": "blue"}, "confidence": 0.6},
                             {"name": "Aria", "type": "character", "attributes": {"eye_color": "grey"}, "confidence": 0.6}]}"#,
        );

        assert!(ReconciledView::build(&graph, &ranking(), &[]).is_empty());
    }

    #[test]
    fn test_non_exclusive_labels_are_not_disputed() {
        let graph = disputed_graph();
        let view = ReconciledView::build(&graph, &ranking(), &[]);
        let aria = view.entity(EntityId::derive(EntityKind::Character, "Aria")).unwrap();
        assert!(aria.relations.is_empty());
    }
}
