//! Speculation Classifier - splits entities into confidence bands on every read.

use lore_model::{Confidence, DocumentId, Entity, EntityId, EntityKind};
use serde::{Deserialize, Serialize};

use crate::config::SpeculationConfig;
use crate::knowledge_base::KnowledgeGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Firm,
    Undetermined,
    Speculative,
}

impl SpeculationConfig {
    /// Band for a confidence value. Both thresholds are exclusive.
    pub fn band(&self, confidence: Confidence) -> Band {
        let value = confidence.value();
        if value > self.firm_above {
            Band::Firm
        } else if value < self.speculative_below {
            Band::Speculative
        } else {
            Band::Undetermined
        }
    }
}

/// What the classifier reports about one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub confidence: Confidence,
    pub sources: Vec<DocumentId>,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.canonical_name.clone(),
            kind: entity.kind,
            confidence: entity.confidence,
            sources: entity.source_ids().cloned().collect(),
        }
    }
}

/// Entities partitioned by confidence, strongest first within each band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeculationBoundaries {
    pub firm: Vec<EntitySummary>,
    pub undetermined: Vec<EntitySummary>,
    pub speculative: Vec<EntitySummary>,
}

impl SpeculationBoundaries {
    pub fn classify(graph: &KnowledgeGraph, config: &SpeculationConfig) -> Self {
        let mut boundaries = Self::default();
        for entity in graph.entities().iter() {
            let summary = EntitySummary::from(entity);
            match config.band(entity.confidence) {
                Band::Firm => boundaries.firm.push(summary),
                Band::Undetermined => boundaries.undetermined.push(summary),
                Band::Speculative => boundaries.speculative.push(summary),
            }
        }
        for band in [
            &mut boundaries.firm,
            &mut boundaries.undetermined,
            &mut boundaries.speculative,
        ] {
            band.sort_by(|a, b| b.confidence.cmp(&a.confidence).then_with(|| a.name.cmp(&b.name)));
        }
        boundaries
    }

    pub fn len(&self) -> usize {
        self.firm.len() + self.undetermined.len() + self.speculative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the bands as input text for an external explanation generator.
    pub fn explanation_prompt(&self) -> String {
        let mut prompt = String::from(
            "Explain which elements of this fictional universe are firmly established and which \
             remain ambiguous or speculative, and what evidence would settle them.\n",
        );
        let sections = [
            ("Firmly established", &self.firm),
            ("Undetermined", &self.undetermined),
            ("Speculative", &self.speculative),
        ];
        for (title, entries) in sections {
            prompt.push_str(&format!("\n{}:\n", title));
            if entries.is_empty() {
                prompt.push_str("- (none)\n");
            }
            for entry in entries {
                let sources: Vec<&str> = entry.sources.iter().map(|s| s.as_str()).collect();
                prompt.push_str(&format!(
                    "- {} ({}), confidence {}, sources: {}\n",
                    entry.name,
                    entry.kind,
                    entry.confidence,
                    sources.join(", ")
                ));
            }
        }
        prompt
    }
}
