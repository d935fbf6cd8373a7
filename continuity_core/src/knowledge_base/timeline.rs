//! Timeline Store - per-entity event sequences kept in timestamp order.

use lore_model::{DocumentId, EntityId, TimelineEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-entity timelines. Each sequence is non-decreasing in timestamp after every insertion;
/// events with equal timestamps keep their insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineStore {
    timelines: BTreeMap<EntityId, Vec<TimelineEvent>>,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event into `owner`'s timeline at its sorted position.
    ///
    /// A repeat of an existing assertion is collapsed, keeping the higher confidence.
    /// Returns `true` if a new event was stored.
    pub fn insert(&mut self, owner: EntityId, event: TimelineEvent) -> bool {
        let timeline = self.timelines.entry(owner).or_default();
        if let Some(existing) = timeline.iter_mut().find(|e| e.same_assertion(&event)) {
            existing.confidence = existing.confidence.aggregate(event.confidence);
            if existing.after.is_none() {
                existing.after = event.after;
            }
            return false;
        }
        let position = timeline.partition_point(|e| e.timestamp <= event.timestamp);
        timeline.insert(position, event);
        true
    }

    /// The events owned by `entity`, in ascending timestamp order.
    pub fn events(&self, entity: EntityId) -> &[TimelineEvent] {
        self.timelines.get(&entity).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &[TimelineEvent])> {
        self.timelines.iter().map(|(id, events)| (*id, events.as_slice()))
    }

    /// Total number of stored events.
    pub fn event_count(&self) -> usize {
        self.timelines.values().map(Vec::len).sum()
    }

    /// Drop every event asserted by `document`. Returns the number removed.
    pub fn remove_document(&mut self, document: &DocumentId) -> usize {
        let mut removed = 0;
        for events in self.timelines.values_mut() {
            let before = events.len();
            events.retain(|e| &e.document != document);
            removed += before - events.len();
        }
        self.timelines.retain(|_, events| !events.is_empty());
        removed
    }

    /// Drop an entity's whole timeline.
    pub fn remove_entity(&mut self, entity: EntityId) -> usize {
        self.timelines.remove(&entity).map(|v| v.len()).unwrap_or(0)
    }
}
