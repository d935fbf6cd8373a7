//! Contradiction Detector - a fixed battery of consistency checks over a graph snapshot.
//!
//! Four independent checks run on every call:
//! 1. **Location**: characters placed in several locations with nothing to tell the stays apart
//! 2. **Timeline**: events declared to follow another event yet dated before it
//! 3. **Attribute**: attributes holding two or more distinct values
//! 4. **Rule**: world rules reviewed by the oracle for logical conflicts
//!
//! Findings are recomputed on demand and never written back into the graph. A failing
//! check becomes a finding with `error` set; the remaining checks still run.

mod checks;

pub use checks::*;

use lore_model::{Confidence, DocumentId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{DetectionConfig, OracleConfig};
use crate::extraction::ExtractionOracle;
use crate::knowledge_base::KnowledgeGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    Location,
    Timeline,
    Attribute,
    Rule,
}

/// One side of a contradiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingStatement {
    pub statement: String,
    pub source: Option<DocumentId>,
    pub confidence: Confidence,
}

/// A derived consistency finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub kind: ContradictionKind,
    pub description: String,
    /// Entity ids, or event descriptions for timeline findings.
    pub involved: Vec<String>,
    pub statements: Vec<ConflictingStatement>,
    pub confidence: Confidence,

    /// Suggested ways to resolve the conflict, when the oracle offered any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolutions: Vec<String>,

    /// Set when the finding reports a failed check rather than a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Contradiction {
    /// Build a finding whose confidence is that of its weakest statement.
    pub fn new(
        kind: ContradictionKind,
        description: impl Into<String>,
        involved: Vec<String>,
        statements: Vec<ConflictingStatement>,
    ) -> Self {
        let confidence = statements
            .iter()
            .map(|s| s.confidence)
            .min()
            .unwrap_or(Confidence::ZERO);
        Self {
            kind,
            description: description.into(),
            involved,
            statements,
            confidence,
            resolutions: Vec::new(),
            error: None,
        }
    }

    /// A finding reporting that `check` could not run.
    pub fn check_failed(check: &str, error: impl std::fmt::Display) -> Self {
        Self {
            kind: ContradictionKind::Rule,
            description: format!("{} check failed", check),
            involved: Vec::new(),
            statements: Vec::new(),
            confidence: Confidence::ZERO,
            resolutions: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs every check against a graph snapshot.
#[derive(Debug, Clone, Default)]
pub struct ContradictionDetector {
    config: DetectionConfig,
    policy: OracleConfig,
}

impl ContradictionDetector {
    pub fn new(config: DetectionConfig, policy: OracleConfig) -> Self {
        Self { config, policy }
    }

    /// Run all four checks. Never fails; check failures are reported as findings.
    pub async fn detect(&self, graph: &KnowledgeGraph, oracle: &dyn ExtractionOracle) -> Vec<Contradiction> {
        let mut findings = location_conflicts(graph, &self.config.location_relations);
        findings.extend(timeline_conflicts(graph));
        findings.extend(attribute_conflicts(graph, &self.config.free_text_attributes));

        match rule_conflicts(graph, oracle, &self.policy).await {
            Ok(rules) => findings.extend(rules),
            Err(err) => {
                warn!(error = %err, "rule check failed");
                findings.push(Contradiction::check_failed("rule", err));
            }
        }

        debug!(findings = findings.len(), "contradiction detection finished");
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::extraction::{parse_strict, ExtractionBundle, OracleRequest, ParseStage, RuleContext};
    use crate::merge::MergeEngine;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Answers every rule review with the same canned result.
    struct ReviewOracle {
        review: Result<String, OracleError>,
        seen: Mutex<Vec<RuleContext>>,
    }

    impl ReviewOracle {
        fn new(review: Result<String, OracleError>) -> Self {
            Self {
                review,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExtractionOracle for ReviewOracle {
        async fn extract(&self, _request: &OracleRequest) -> Result<String, OracleError> {
            Ok("{}".to_string())
        }

        async fn review_rules(&self, rules: &[RuleContext]) -> Result<String, OracleError> {
            self.seen.lock().extend(rules.iter().cloned());
            self.review.clone()
        }
    }

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    fn graph_with_rules() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.register_document(doc("D1"), "Codex", None);
        let output = parse_strict(
            r#"{"entities": [{"name": "Aria", "type": "character", "attributes": {"eye_color": "blue"}, "confidence": 0.9},
                             {"name": "Aria", "type": "character", "attributes": {"eye_color": "green"}, "confidence": 0.9}],
                "world_rules": [
                    {"rule_name": "Magic is free", "description": "Spells have no cost", "confidence": 0.9},
                    {"rule_name": "Blood price", "description": "Every spell costs blood", "confidence": 0.8}
                ]}"#,
        )
        .unwrap();
        let bundle = ExtractionBundle::from_outputs(doc("D1"), &[(output, ParseStage::Strict)]);
        MergeEngine::commit(&mut graph, &doc("D1"), &bundle).unwrap();
        graph
    }

    fn detector() -> ContradictionDetector {
        let policy = OracleConfig {
            timeout_ms: 100,
            max_retries: 1,
            backoff_ms: 1,
        };
        ContradictionDetector::new(DetectionConfig::default(), policy)
    }

    #[tokio::test]
    async fn test_rule_conflicts_from_review() {
        let graph = graph_with_rules();
        let oracle = ReviewOracle::new(Ok(r#"{"contradictions": [{
            "rules": ["magic is free", "Blood Price"],
            "description": "Spells cannot be both free and costly",
            "resolution_options": ["Free spells are cantrips only"],
            "confidence": 0.75
        }]}"#
            .to_string()));

        let findings = detector().detect(&graph, &oracle).await;

        assert_eq!(oracle.seen.lock().len(), 2);
        let rule = findings.iter().find(|f| f.kind == ContradictionKind::Rule).unwrap();
        assert!(!rule.is_error());
        assert_eq!(rule.involved.len(), 2);
        assert_eq!(rule.statements.len(), 2);
        assert_eq!(rule.confidence, Confidence::new(0.75));
        assert_eq!(rule.resolutions, vec!["Free spells are cantrips only".to_string()]);
        assert!(findings.iter().any(|f| f.kind == ContradictionKind::Attribute));
    }

    #[tokio::test]
    async fn test_rule_check_failure_does_not_abort_other_checks() {
        let graph = graph_with_rules();
        let oracle = ReviewOracle::new(Err(OracleError::Unavailable("connection refused".into())));

        let findings = detector().detect(&graph, &oracle).await;

        let failure = findings.iter().find(|f| f.is_error()).unwrap();
        assert_eq!(failure.kind, ContradictionKind::Rule);
        assert!(failure.error.as_deref().unwrap().contains("connection refused"));
        assert!(findings.iter().any(|f| f.kind == ContradictionKind::Attribute));
    }

    #[tokio::test]
    async fn test_malformed_review_is_reported() {
        let graph = graph_with_rules();
        let oracle = ReviewOracle::new(Ok("the rules look fine to me".to_string()));

        let findings = detector().detect(&graph, &oracle).await;

        assert_eq!(findings.iter().filter(|f| f.is_error()).count(), 1);
    }

    #[tokio::test]
    async fn test_single_rule_skips_oracle() {
        let mut graph = KnowledgeGraph::new();
        graph.register_document(doc("D1"), "Codex", None);
        let output = parse_strict(r#"{"world_rules": [{"rule_name": "Magic is free", "description": "", "confidence": 0.9}]}"#).unwrap();
        let bundle = ExtractionBundle::from_outputs(doc("D1"), &[(output, ParseStage::Strict)]);
        MergeEngine::commit(&mut graph, &doc("D1"), &bundle).unwrap();
        let oracle = ReviewOracle::new(Err(OracleError::Unavailable("unused".into())));

        let findings = detector().detect(&graph, &oracle).await;

        assert!(findings.is_empty());
        assert!(oracle.seen.lock().is_empty());
    }
}
