//! The individual consistency checks.

use lore_model::{normalize_name, Entity, EntityId, EntityKind, Relationship, TimelineEvent, Timestamp};
use std::collections::BTreeMap;

use super::{ConflictingStatement, Contradiction, ContradictionKind};
use crate::config::OracleConfig;
use crate::error::RuleCheckError;
use crate::extraction::{call_with_retry, parse_rule_review, ExtractionOracle, RuleContext};
use crate::knowledge_base::KnowledgeGraph;

/// Characters linked to two or more distinct places through `relations`, unless every
/// place is anchored by one of the character's timeline events at its own timestamp.
pub fn location_conflicts(graph: &KnowledgeGraph, relations: &[String]) -> Vec<Contradiction> {
    let mut findings = Vec::new();

    for character in graph.entities().by_kind(EntityKind::Character) {
        let mut places: BTreeMap<EntityId, Vec<&Relationship>> = BTreeMap::new();
        for edge in graph.relationships().outgoing(character.id) {
            if !relations.iter().any(|label| label == &edge.label) {
                continue;
            }
            let is_place = graph
                .entity(edge.target)
                .map(|target| matches!(target.kind, EntityKind::Location | EntityKind::Other))
                .unwrap_or(false);
            if is_place {
                places.entry(edge.target).or_default().push(edge);
            }
        }
        if places.len() < 2 {
            continue;
        }

        let locations: Vec<&Entity> = places.keys().filter_map(|id| graph.entity(*id)).collect();
        if distinguished_by_timeline(&locations, graph.timelines().events(character.id)) {
            continue;
        }

        let mut statements = Vec::new();
        for location in &locations {
            for edge in places.get(&location.id).into_iter().flatten() {
                statements.push(ConflictingStatement {
                    statement: format!("{} {} {}", character.canonical_name, edge.label, location.canonical_name),
                    source: Some(edge.document.clone()),
                    confidence: edge.confidence,
                });
            }
        }

        let names: Vec<&str> = locations.iter().map(|l| l.canonical_name.as_str()).collect();
        let mut involved = vec![character.id.to_string()];
        involved.extend(locations.iter().map(|l| l.id.to_string()));

        findings.push(Contradiction::new(
            ContradictionKind::Location,
            format!(
                "{} is placed in {} locations with no timeline event telling them apart: {}",
                character.canonical_name,
                names.len(),
                names.join(", ")
            ),
            involved,
            statements,
        ));
    }

    findings
}

fn distinguished_by_timeline(locations: &[&Entity], timeline: &[TimelineEvent]) -> bool {
    let mut anchors: Vec<&Timestamp> = Vec::with_capacity(locations.len());
    for location in locations {
        let name = location.canonical_name.to_lowercase();
        match timeline
            .iter()
            .find(|event| event.description.to_lowercase().contains(&name))
        {
            Some(event) => anchors.push(&event.timestamp),
            None => return false,
        }
    }
    anchors
        .iter()
        .enumerate()
        .all(|(i, a)| anchors[i + 1..].iter().all(|b| a != b))
}

/// Events declared to happen after another event of the same timeline while carrying
/// an earlier timestamp.
pub fn timeline_conflicts(graph: &KnowledgeGraph) -> Vec<Contradiction> {
    let mut findings = Vec::new();

    for (owner, events) in graph.timelines().iter() {
        let owner_name = graph
            .entity(owner)
            .map(|e| e.canonical_name.clone())
            .unwrap_or_else(|| owner.to_string());

        for (i, earlier) in events.iter().enumerate() {
            for later in &events[i + 1..] {
                if earlier.timestamp >= later.timestamp || !earlier.declares_after(later) {
                    continue;
                }
                let statements = [earlier, later]
                    .into_iter()
                    .map(|event| ConflictingStatement {
                        statement: format!("{} at {}", event.description, event.timestamp),
                        source: Some(event.document.clone()),
                        confidence: event.confidence,
                    })
                    .collect();
                findings.push(Contradiction::new(
                    ContradictionKind::Timeline,
                    format!(
                        "In the timeline of {}, '{}' follows '{}' but is dated {}, before {}",
                        owner_name, earlier.description, later.description, earlier.timestamp, later.timestamp
                    ),
                    vec![earlier.description.clone(), later.description.clone()],
                    statements,
                ));
            }
        }
    }

    findings
}

/// Attributes with two or more distinct values, skipping the free-text ones.
pub fn attribute_conflicts(graph: &KnowledgeGraph, free_text: &[String]) -> Vec<Contradiction> {
    let mut findings = Vec::new();

    for entity in graph.entities().iter() {
        for (name, values) in &entity.attributes {
            if free_text.iter().any(|skip| skip == name) {
                continue;
            }
            let distinct = entity.distinct_values(name);
            if distinct.len() < 2 {
                continue;
            }

            let listed: Vec<&str> = distinct.iter().map(|v| v.value.as_str()).collect();
            let statements = values
                .iter()
                .map(|v| ConflictingStatement {
                    statement: format!("{} {} is {}", entity.canonical_name, name, v.value),
                    source: Some(v.source.clone()),
                    confidence: v.confidence,
                })
                .collect();

            findings.push(Contradiction::new(
                ContradictionKind::Attribute,
                format!(
                    "{} has conflicting values for {}: {}",
                    entity.canonical_name,
                    name,
                    listed.join(", ")
                ),
                vec![entity.id.to_string()],
                statements,
            ));
        }
    }

    findings
}

/// Ask the oracle to review all world rules together. Fewer than two rules cannot conflict.
pub async fn rule_conflicts(
    graph: &KnowledgeGraph,
    oracle: &dyn ExtractionOracle,
    policy: &OracleConfig,
) -> Result<Vec<Contradiction>, RuleCheckError> {
    let rules: Vec<&Entity> = graph.entities().by_kind(EntityKind::Rule).collect();
    if rules.len() < 2 {
        return Ok(Vec::new());
    }

    let contexts: Vec<RuleContext> = rules
        .iter()
        .map(|rule| RuleContext {
            id: rule.id.to_string(),
            name: rule.canonical_name.clone(),
            description: rule
                .attribute("description")
                .first()
                .map(|v| v.value.clone())
                .unwrap_or_default(),
            sources: rule.source_ids().map(|s| s.to_string()).collect(),
        })
        .collect();

    let raw = call_with_retry(policy, || oracle.review_rules(&contexts)).await?;
    let review = parse_rule_review(&raw)?;

    let findings = review
        .contradictions
        .into_iter()
        .map(|conflict| {
            let mut involved = Vec::new();
            let mut statements = Vec::new();
            for reference in &conflict.rules {
                let wanted = normalize_name(reference);
                let matched = rules
                    .iter()
                    .find(|r| normalize_name(&r.canonical_name) == wanted || r.id.to_string() == *reference);
                match matched {
                    Some(rule) => {
                        involved.push(rule.id.to_string());
                        let text = rule
                            .attribute("description")
                            .first()
                            .map(|v| format!("{}: {}", rule.canonical_name, v.value))
                            .unwrap_or_else(|| rule.canonical_name.clone());
                        statements.push(ConflictingStatement {
                            statement: text,
                            source: rule.source_ids().next().cloned(),
                            confidence: rule.confidence,
                        });
                    }
                    None => involved.push(reference.clone()),
                }
            }

            let mut finding = Contradiction::new(ContradictionKind::Rule, conflict.description, involved, statements);
            finding.confidence = conflict.confidence.into();
            finding.resolutions = conflict.resolution_options;
            finding
        })
        .collect();

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::extraction::{parse_strict, ExtractionBundle, ParseStage};
    use crate::merge::MergeEngine;
    use lore_model::DocumentId;

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    fn commit(graph: &mut KnowledgeGraph, id: &str, json: &str) {
        graph.register_document(doc(id), id, None);
        let output = parse_strict(json).unwrap();
        let bundle = ExtractionBundle::from_outputs(doc(id), &[(output, ParseStage::Strict)]);
        MergeEngine::commit(graph, &doc(id), &bundle).unwrap();
    }

    fn relations() -> Vec<String> {
        DetectionConfig::default().location_relations
    }

    fn aria_in_two_places() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        commit(
            &mut graph,
            "D1",
            r#"{"entities": [{"name": "Aria", "type": "character", "confidence": 0.9},
                             {"name": "Forest", "type": "location", "confidence": 0.9}],
                "relationships": [{"source": "Aria", "target": "Forest", "relationship": "located_in", "confidence": 0.9}]}"#,
        );
        commit(
            &mut graph,
            "D2",
            r#"{"entities": [{"name": "Aria", "type": "character", "confidence": 0.7},
                             {"name": "Castle", "type": "location", "confidence": 0.7}],
                "relationships": [{"source": "Aria", "target": "Castle", "relationship": "located_in", "confidence": 0.7}]}"#,
        );
        graph
    }

    #[test]
    fn test_location_conflict() {
        let graph = aria_in_two_places();
        let findings = location_conflicts(&graph, &relations());

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, ContradictionKind::Location);
        assert!(finding.description.contains("Forest"));
        assert!(finding.description.contains("Castle"));
        assert_eq!(finding.involved.len(), 3);
        assert_eq!(finding.statements.len(), 2);
        assert_eq!(finding.confidence, lore_model::Confidence::new(0.7));
    }

    #[test]
    fn test_locations_told_apart_by_timeline() {
        let mut graph = aria_in_two_places();
        commit(
            &mut graph,
            "D3",
            r#"{"timeline_events": [
                {"event": "Aria hides in the Forest", "time_reference": 1, "entities": ["Aria"], "confidence": 0.8},
                {"event": "Aria storms the Castle", "time_reference": 2, "entities": ["Aria"], "confidence": 0.8}
            ]}"#,
        );

        assert!(location_conflicts(&graph, &relations()).is_empty());
    }

    #[test]
    fn test_same_time_anchors_still_conflict() {
        let mut graph = aria_in_two_places();
        commit(
            &mut graph,
            "D3",
            r#"{"timeline_events": [
                {"event": "Aria hides in the Forest", "time_reference": 1, "entities": ["Aria"], "confidence": 0.8},
                {"event": "Aria storms the Castle", "time_reference": 1, "entities": ["Aria"], "confidence": 0.8}
            ]}"#,
        );

        assert_eq!(location_conflicts(&graph, &relations()).len(), 1);
    }

    #[test]
    fn test_unrelated_labels_are_ignored() {
        let graph = aria_in_two_places();
        assert!(location_conflicts(&graph, &["visits".to_string()]).is_empty());
    }

    #[test]
    fn test_timeline_conflict() {
        let mut graph = KnowledgeGraph::new();
        commit(
            &mut graph,
            "D1",
            r#"{"entities": [{"name": "Aria", "type": "character", "confidence": 0.9}],
                "timeline_events": [
                    {"event": "The coronation", "time_reference": 10, "entities": ["Aria"], "confidence": 0.9},
                    {"event": "The feast", "time_reference": 5, "entities": ["Aria"], "after": "The coronation", "confidence": 0.6}
                ]}"#,
        );

        let findings = timeline_conflicts(&graph);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, ContradictionKind::Timeline);
        assert_eq!(findings[0].involved, vec!["The feast".to_string(), "The coronation".to_string()]);
        assert_eq!(findings[0].confidence, lore_model::Confidence::new(0.6));
    }

    #[test]
    fn test_timeline_conflict_from_description() {
        let mut graph = KnowledgeGraph::new();
        commit(
            &mut graph,
            "D1",
            r#"{"entities": [{"name": "Aria", "type": "character", "confidence": 0.9}],
                "timeline_events": [
                    {"event": "The war", "time_reference": 20, "entities": ["Aria"], "confidence": 0.9},
                    {"event": "Peace returns after the war", "time_reference": 3, "entities": ["Aria"], "confidence": 0.9}
                ]}"#,
        );

        assert_eq!(timeline_conflicts(&graph).len(), 1);
    }

    #[test]
    fn test_consistent_timeline() {
        let mut graph = KnowledgeGraph::new();
        commit(
            &mut graph,
            "D1",
            r#"{"entities": [{"name": "Aria", "type": "character", "confidence": 0.9}],
                "timeline_events": [
                    {"event": "The war", "time_reference": 1, "entities": ["Aria"], "confidence": 0.9},
                    {"event": "Peace returns after the war", "time_reference": 3, "entities": ["Aria"], "confidence": 0.9}
                ]}"#,
        );

        assert!(timeline_conflicts(&graph).is_empty());
    }

    #[test]
    fn test_attribute_conflict() {
        let mut graph = KnowledgeGraph::new();
        commit(
            &mut graph,
            "D1",
            r#"{"entities": [{"name": "Aria", "type": "character", "description": "A mage",
                              "attributes": {"eye_color": "blue"}, "confidence": 0.9}]}"#,
        );
        commit(
            &mut graph,
            "D2",
            r#"{"entities": [{"name": "Aria", "type": "character", "description": "A thief",
                              "attributes": {"eye_color": "Green"}, "confidence": 0.8}]}"#,
        );

        let findings = attribute_conflicts(&graph, &["description".to_string()]);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("blue, Green"));
        let sources: Vec<_> = findings[0].statements.iter().filter_map(|s| s.source.clone()).collect();
        assert_eq!(sources, vec![doc("D1"), doc("D2")]);
    }

    #[test]
    fn test_attribute_case_only_difference_is_not_a_conflict() {
        let mut graph = KnowledgeGraph::new();
        commit(
            &mut graph,
            "D1",
            r#"{"entities": [{"name": "Aria", "type": "character", "attributes": {"eye_color": "blue"}, "confidence": 0.9}]}"#,
        );
        commit(
            &mut graph,
            "D2",
            r#"{"entities": [{"name": "Aria", "type": "character", "attributes": {"eye_color": " Blue"}, "confidence": 0.9}]}"#,
        );

        assert!(attribute_conflicts(&graph, &[]).is_empty());
    }
}
