//! Entity Registry - canonical store of entities keyed by stable identity.

use lore_model::{normalize_name, Confidence, DocumentId, Entity, EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created(EntityId),
    Merged(EntityId),
}

impl Upsert {
    pub fn id(&self) -> EntityId {
        match self {
            Upsert::Created(id) | Upsert::Merged(id) => *id,
        }
    }
}

/// Canonical store of narrative entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mention of `(kind, name)` from `source`.
    ///
    /// An exact kind + normalized name match reuses the existing entity, unions its
    /// sources and keeps the maximum confidence; otherwise a new entity is created.
    pub fn upsert(
        &mut self,
        kind: EntityKind,
        name: &str,
        source: &DocumentId,
        confidence: Confidence,
    ) -> Upsert {
        let id = EntityId::derive(kind, name);
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.mention(source, confidence);
                Upsert::Merged(id)
            }
            None => {
                let mut entity = Entity::new(kind, name);
                entity.mention(source, confidence);
                self.entities.insert(id, entity);
                Upsert::Created(id)
            }
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Find entities of any kind whose normalized name matches.
    pub fn find_by_name(&self, name: &str) -> Vec<&Entity> {
        let wanted = normalize_name(name);
        self.entities
            .values()
            .filter(|e| normalize_name(&e.canonical_name) == wanted)
            .collect()
    }

    /// Get all entities of one kind.
    pub fn by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
