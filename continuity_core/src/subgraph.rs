//! Subgraph Query - bounded breadth-first neighborhoods around one entity.

use lore_model::{Entity, EntityId, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::knowledge_base::KnowledgeGraph;

/// An entity in a neighborhood, with its hop distance from the center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphNode {
    pub entity: Entity,
    pub distance: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<Relationship>,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.iter().any(|n| n.entity.id == id)
    }
}

/// Collect everything within `depth` hops of `center`, following edges in both directions.
///
/// Returned edges are those with both endpoints inside the neighborhood. An unknown
/// center yields an empty subgraph; depth 0 yields the center alone.
pub fn export_neighborhood(graph: &KnowledgeGraph, center: EntityId, depth: u32) -> Subgraph {
    let Some(root) = graph.entity(center) else {
        return Subgraph::default();
    };
    if depth == 0 {
        return Subgraph {
            nodes: vec![SubgraphNode {
                entity: root.clone(),
                distance: 0,
            }],
            edges: Vec::new(),
        };
    }

    let adjacency = graph.relationships().adjacency();
    let mut distances: BTreeMap<EntityId, u32> = BTreeMap::from([(center, 0)]);
    let mut queue = VecDeque::from([center]);

    while let Some(current) = queue.pop_front() {
        let distance = distances.get(&current).copied().unwrap_or(0);
        if distance >= depth {
            continue;
        }
        for neighbor in adjacency.get(&current).into_iter().flatten() {
            if !distances.contains_key(neighbor) {
                distances.insert(*neighbor, distance + 1);
                queue.push_back(*neighbor);
            }
        }
    }

    let mut nodes: Vec<SubgraphNode> = distances
        .iter()
        .filter_map(|(id, distance)| {
            graph.entity(*id).map(|entity| SubgraphNode {
                entity: entity.clone(),
                distance: *distance,
            })
        })
        .collect();
    nodes.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.entity.id.cmp(&b.entity.id)));

    let edges = graph
        .relationships()
        .iter()
        .filter(|e| distances.contains_key(&e.source) && distances.contains_key(&e.target))
        .cloned()
        .collect();

    Subgraph { nodes, edges }
}
