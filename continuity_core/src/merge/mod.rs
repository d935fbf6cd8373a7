//! Merge Engine - commits one document's extraction bundle into a knowledge graph.
//!
//! A commit runs in three passes over the bundle:
//! 1. **Entities**: upsert every entity and world rule, appending attribute values
//! 2. **Edges**: resolve both endpoints, then insert with referential integrity checks
//! 3. **Timelines**: resolve participants and insert each event into their timelines
//!
//! Commits mutate the graph they are given. Callers needing per-document atomicity run
//! the commit against a private clone and publish it only on success.

mod reconcile;

pub use reconcile::*;

use lore_model::{AttributeValue, Confidence, DocumentId, EntityId, EntityKind, Relationship, TimelineEvent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::extraction::{EntityMention, EntityRef, ExtractionBundle};
use crate::knowledge_base::{KnowledgeGraph, Upsert};

/// Counts of what one commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub entities_created: usize,
    pub entities_merged: usize,
    pub relationships_added: usize,
    pub timeline_events_added: usize,
    /// Facts already present from the same document.
    pub duplicates_collapsed: usize,
}

/// Stateless commit logic.
pub struct MergeEngine;

impl MergeEngine {
    /// Commit `bundle` as the contribution of `document`.
    ///
    /// Fails only if an edge would reference an entity missing from the registry, which
    /// the endpoint resolution rules out; the graph may be partially updated on error.
    pub fn commit(
        graph: &mut KnowledgeGraph,
        document: &DocumentId,
        bundle: &ExtractionBundle,
    ) -> Result<CommitSummary, GraphError> {
        let mut summary = CommitSummary::default();

        for mention in bundle.entities.iter().chain(bundle.rules.iter()) {
            Self::merge_entity(graph, document, mention, &mut summary);
        }

        for mention in &bundle.relationships {
            let source = Self::resolve(graph, document, &mention.source, mention.confidence, &mut summary);
            let target = Self::resolve(graph, document, &mention.target, mention.confidence, &mut summary);
            let edge = Relationship::new(source, target, mention.label.as_str(), document.clone(), mention.confidence);
            if graph.relationships.insert(edge, &graph.entities)? {
                summary.relationships_added += 1;
            } else {
                summary.duplicates_collapsed += 1;
            }
        }

        for mention in &bundle.timeline_events {
            let mut owners: Vec<EntityId> = mention
                .participants
                .iter()
                .map(|participant| Self::resolve(graph, document, participant, mention.confidence, &mut summary))
                .collect();
            owners.sort_unstable();
            owners.dedup();
            if owners.is_empty() {
                let upsert = graph
                    .entities
                    .upsert(EntityKind::Event, &mention.description, document, mention.confidence);
                summary.record(upsert);
                owners.push(upsert.id());
            }

            for owner in owners {
                let mut event = TimelineEvent::new(
                    mention.description.as_str(),
                    mention.timestamp.clone(),
                    document.clone(),
                    mention.confidence,
                );
                if let Some(after) = &mention.after {
                    event = event.with_after(after.as_str());
                }
                if graph.timelines.insert(owner, event) {
                    summary.timeline_events_added += 1;
                } else {
                    summary.duplicates_collapsed += 1;
                }
            }
        }

        debug!(
            document = %document,
            created = summary.entities_created,
            merged = summary.entities_merged,
            edges = summary.relationships_added,
            events = summary.timeline_events_added,
            "bundle committed"
        );
        Ok(summary)
    }

    fn merge_entity(
        graph: &mut KnowledgeGraph,
        document: &DocumentId,
        mention: &EntityMention,
        summary: &mut CommitSummary,
    ) {
        let upsert = graph
            .entities
            .upsert(mention.kind, &mention.name, document, mention.confidence);
        summary.record(upsert);

        if let Some(entity) = graph.entities.get_mut(upsert.id()) {
            for (name, value) in &mention.attributes {
                entity.add_attribute(
                    name.as_str(),
                    AttributeValue::new(value.as_str(), document.clone(), mention.confidence),
                );
            }
        }
    }

    /// Resolve a reference to an entity id, creating an `Other` entity if nothing matches.
    ///
    /// Declared kinds map straight to their derived id. Undeclared names match registry
    /// entities by normalized name, preferring the most confident one.
    fn resolve(
        graph: &mut KnowledgeGraph,
        document: &DocumentId,
        reference: &EntityRef,
        confidence: Confidence,
        summary: &mut CommitSummary,
    ) -> EntityId {
        if let Some(kind) = reference.kind {
            let id = EntityId::derive(kind, &reference.name);
            if Self::mention_existing(graph, id, document, confidence) {
                return id;
            }
            let upsert = graph.entities.upsert(kind, &reference.name, document, confidence);
            summary.record(upsert);
            return upsert.id();
        }

        let known = graph
            .entities
            .find_by_name(&reference.name)
            .into_iter()
            .max_by(|a, b| a.confidence.cmp(&b.confidence).then_with(|| b.id.cmp(&a.id)))
            .map(|entity| entity.id);
        if let Some(id) = known {
            Self::mention_existing(graph, id, document, confidence);
            return id;
        }

        let upsert = graph
            .entities
            .upsert(EntityKind::Other, &reference.name, document, confidence);
        summary.record(upsert);
        upsert.id()
    }

    /// Record `document` as a source of an existing entity. Returns `false` if `id` is unknown.
    fn mention_existing(
        graph: &mut KnowledgeGraph,
        id: EntityId,
        document: &DocumentId,
        confidence: Confidence,
    ) -> bool {
        match graph.entities.get_mut(id) {
            Some(entity) => {
                entity.mention(document, confidence);
                true
            }
            None => false,
        }
    }
}

impl CommitSummary {
    fn record(&mut self, upsert: Upsert) {
        match upsert {
            Upsert::Created(_) => self.entities_created += 1,
            Upsert::Merged(_) => self.entities_merged += 1,
        }
    }
}
