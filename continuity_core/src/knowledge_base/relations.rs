//! Relationship Graph - directed multi-edge graph over entity ids.

use lore_model::{DocumentId, EntityId, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::EntityRegistry;
use crate::error::GraphError;

/// Directed, labelled multi-graph. Every edge's endpoints exist in the registry it was
/// inserted against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    edges: Vec<Relationship>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge after checking both endpoints against `registry`.
    ///
    /// A repeat of an existing assertion (same endpoints, label and document) is collapsed,
    /// keeping the higher confidence. Returns `true` if a new edge was added.
    pub fn insert(
        &mut self,
        edge: Relationship,
        registry: &EntityRegistry,
    ) -> Result<bool, GraphError> {
        for endpoint in [edge.source, edge.target] {
            if !registry.contains(endpoint) {
                return Err(GraphError::ReferentialIntegrity {
                    label: edge.label.clone(),
                    missing: endpoint,
                });
            }
        }

        if let Some(existing) = self.edges.iter_mut().find(|e| e.same_assertion(&edge)) {
            existing.confidence = existing.confidence.aggregate(edge.confidence);
            return Ok(false);
        }

        self.edges.push(edge);
        Ok(true)
    }

    /// Edges leaving `entity`.
    pub fn outgoing(&self, entity: EntityId) -> impl Iterator<Item = &Relationship> {
        self.edges.iter().filter(move |e| e.source == entity)
    }

    /// Edges arriving at `entity`.
    pub fn incoming(&self, entity: EntityId) -> impl Iterator<Item = &Relationship> {
        self.edges.iter().filter(move |e| e.target == entity)
    }

    /// Undirected adjacency over all edges.
    pub fn adjacency(&self) -> BTreeMap<EntityId, BTreeSet<EntityId>> {
        let mut adjacency: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.source).or_default().insert(edge.target);
            adjacency.entry(edge.target).or_default().insert(edge.source);
        }
        adjacency
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drop every edge asserted by `document`. Returns the number removed.
    pub fn remove_document(&mut self, document: &DocumentId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| &e.document != document);
        before - self.edges.len()
    }

    /// Drop every edge touching `entity`. Returns the number removed.
    pub fn remove_entity(&mut self, entity: EntityId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(entity));
        before - self.edges.len()
    }
}
