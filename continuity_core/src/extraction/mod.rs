//! Extraction Adapter - turns a document into a normalized bundle of narrative facts.
//!
//! The adapter owns everything between raw document text and the merge engine:
//! 1. **Chunking**: split documents above the configured size
//! 2. **Oracle call**: one call per chunk, with timeout and retry
//! 3. **Parsing**: strict JSON, then repaired JSON, then keyword-based line classification
//! 4. **Normalization**: typed kinds, parsed timestamps, bounded confidences, resolved references
//!
//! Every fact in the bundle is attributed to the document, never to a chunk.

mod chunk;
mod oracle;
mod schema;

pub use chunk::*;
pub use oracle::*;
pub use schema::*;

use lore_model::{normalize_name, normalize_label, Confidence, DocumentId, EntityKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ExtractionConfig, OracleConfig};
use crate::error::ExtractionError;

/// A mention of an entity (or world rule) in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub kind: EntityKind,
    pub name: String,
    /// Attribute name/value pairs in the order they were stated.
    pub attributes: Vec<(String, String)>,
    pub confidence: Confidence,
}

/// Reference to an entity by name. `kind` is known when the document declared the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    pub kind: Option<EntityKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMention {
    pub source: EntityRef,
    pub target: EntityRef,
    pub label: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMention {
    pub description: String,
    pub timestamp: Timestamp,
    pub after: Option<String>,
    /// Entities whose timelines receive this event. Empty means the event stands alone.
    pub participants: Vec<EntityRef>,
    pub confidence: Confidence,
}

/// Normalized extraction result for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBundle {
    pub document: DocumentId,
    pub entities: Vec<EntityMention>,
    pub relationships: Vec<RelationMention>,
    pub timeline_events: Vec<EventMention>,
    pub rules: Vec<EntityMention>,
    /// Weakest parsing stage any chunk needed.
    pub parse_stage: ParseStage,
    pub chunks: usize,
}

impl ExtractionBundle {
    /// Build a bundle from parsed oracle outputs (one per chunk).
    pub fn from_outputs(document: DocumentId, outputs: &[(OracleOutput, ParseStage)]) -> Self {
        let mut entities = Vec::new();
        let mut rules = Vec::new();
        for (output, _) in outputs {
            entities.extend(output.entities.iter().filter_map(entity_mention));
            rules.extend(output.world_rules.iter().filter_map(rule_mention));
        }

        // First declaration of a name decides the kind used for references to it.
        let mut declared: HashMap<String, EntityKind> = HashMap::new();
        for mention in entities.iter().chain(rules.iter()) {
            declared.entry(normalize_name(&mention.name)).or_insert(mention.kind);
        }
        let reference = |name: &str| EntityRef {
            name: name.trim().to_string(),
            kind: declared.get(&normalize_name(name)).copied(),
        };

        let mut relationships = Vec::new();
        let mut timeline_events = Vec::new();
        for (output, _) in outputs {
            for raw in &output.relationships {
                let label = normalize_label(&raw.relationship);
                if raw.source.trim().is_empty() || raw.target.trim().is_empty() || label.is_empty() {
                    continue;
                }
                relationships.push(RelationMention {
                    source: reference(raw.source.as_str()),
                    target: reference(raw.target.as_str()),
                    label,
                    confidence: Confidence::new(raw.confidence),
                });
            }
            for raw in &output.timeline_events {
                let description = raw.event.trim();
                if description.is_empty() {
                    continue;
                }
                timeline_events.push(EventMention {
                    description: description.to_string(),
                    timestamp: Timestamp::parse(&value_to_text(&raw.time_reference)),
                    after: raw
                        .after
                        .as_deref()
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(String::from),
                    participants: raw
                        .entities
                        .iter()
                        .filter(|n| !n.trim().is_empty())
                        .map(|n| reference(n.as_str()))
                        .collect(),
                    confidence: Confidence::new(raw.confidence),
                });
            }
        }

        let parse_stage = outputs
            .iter()
            .map(|(_, stage)| *stage)
            .max_by_key(|stage| match stage {
                ParseStage::Strict => 0,
                ParseStage::Repaired => 1,
                ParseStage::Heuristic => 2,
            })
            .unwrap_or(ParseStage::Strict);

        Self {
            document,
            entities,
            relationships,
            timeline_events,
            rules,
            parse_stage,
            chunks: outputs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relationships.is_empty()
            && self.timeline_events.is_empty()
            && self.rules.is_empty()
    }
}

fn entity_mention(raw: &RawEntity) -> Option<EntityMention> {
    let name = raw.name.trim();
    if name.is_empty() {
        return None;
    }
    let mut attributes = Vec::new();
    if let Some(description) = raw.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            attributes.push(("description".to_string(), description.to_string()));
        }
    }
    for (key, value) in &raw.attributes {
        let value = value_to_text(value);
        let key = normalize_label(key);
        if !value.is_empty() && !key.is_empty() {
            attributes.push((key, value));
        }
    }
    Some(EntityMention {
        kind: EntityKind::from_label(&raw.kind),
        name: name.to_string(),
        attributes,
        confidence: Confidence::new(raw.confidence),
    })
}

fn rule_mention(raw: &RawRule) -> Option<EntityMention> {
    let name = raw.rule_name.trim();
    if name.is_empty() {
        return None;
    }
    let description = raw.description.trim();
    let attributes = if description.is_empty() {
        Vec::new()
    } else {
        vec![("description".to_string(), description.to_string())]
    };
    Some(EntityMention {
        kind: EntityKind::Rule,
        name: name.to_string(),
        attributes,
        confidence: Confidence::new(raw.confidence),
    })
}

/// Invokes the oracle for a document and normalizes its output.
#[derive(Clone)]
pub struct ExtractionAdapter {
    oracle: Arc<dyn ExtractionOracle>,
    config: ExtractionConfig,
    policy: OracleConfig,
}

impl ExtractionAdapter {
    pub fn new(oracle: Arc<dyn ExtractionOracle>, config: ExtractionConfig, policy: OracleConfig) -> Self {
        Self {
            oracle,
            config,
            policy,
        }
    }

    /// Extract a bundle from `text`. Fails without partial results if any chunk fails.
    pub async fn extract(
        &self,
        document: &DocumentId,
        text: &str,
        source_name: &str,
        source_type: &str,
    ) -> Result<ExtractionBundle, ExtractionError> {
        let chunks = chunk_text(text, self.config.max_chunk_chars, self.config.chunk_overlap);
        debug!(document = %document, chunks = chunks.len(), "extracting document");

        let mut outputs = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let request = OracleRequest {
                document_text: chunk.to_string(),
                source_type: source_type.to_string(),
                source_name: source_name.to_string(),
            };
            let raw = call_with_retry(&self.policy, || self.oracle.extract(&request)).await?;
            outputs.push(self.parse(document, raw)?);
        }

        Ok(ExtractionBundle::from_outputs(document.clone(), &outputs))
    }

    /// Parse one oracle response through the strict, repaired and heuristic stages.
    pub fn parse(
        &self,
        document: &DocumentId,
        raw: String,
    ) -> Result<(OracleOutput, ParseStage), ExtractionError> {
        let strict_error = match parse_strict(&raw) {
            Ok(output) => return Ok((output, ParseStage::Strict)),
            Err(err) => err,
        };
        let repair_error = match parse_repaired(&raw) {
            Ok(output) => {
                debug!(document = %document, error = %strict_error, "oracle output needed repair");
                return Ok((output, ParseStage::Repaired));
            }
            Err(err) => err,
        };

        if self.config.heuristic_fallback {
            let output = parse_heuristic(&raw, self.config.fallback_confidence);
            if !output.is_empty() {
                warn!(
                    document = %document,
                    error = %repair_error,
                    "oracle output is not JSON; using section heuristics"
                );
                return Ok((output, ParseStage::Heuristic));
            }
        }

        warn!(document = %document, error = %repair_error, "oracle output could not be parsed");
        Err(ExtractionError::Parse {
            document: document.clone(),
            raw,
        })
    }
}
