//! Engine configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StorageError;

/// Top-level configuration for the continuity engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for persisted universes.
    pub data_dir: PathBuf,
    pub extraction: ExtractionConfig,
    pub oracle: OracleConfig,
    pub detection: DetectionConfig,
    pub speculation: SpeculationConfig,
    pub canon: CanonConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            extraction: ExtractionConfig::default(),
            oracle: OracleConfig::default(),
            detection: DetectionConfig::default(),
            speculation: SpeculationConfig::default(),
            canon: CanonConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML. Missing sections fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, StorageError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Configuration for the extraction adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Documents longer than this (in characters) are split before reaching the oracle.
    pub max_chunk_chars: usize,

    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,

    /// Fall back to keyword-based line classification when JSON parsing fails.
    pub heuristic_fallback: bool,

    /// Confidence assigned to facts recovered by the heuristic fallback.
    pub fallback_confidence: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 8000,
            chunk_overlap: 200,
            heuristic_fallback: true,
            fallback_confidence: 0.5,
        }
    }
}

/// Timeout and retry policy for oracle calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub timeout_ms: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry; doubled for each further retry.
    pub backoff_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 3,
            backoff_ms: 250,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Configuration for the contradiction checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Relation labels that place an entity somewhere.
    pub location_relations: Vec<String>,

    /// Attributes holding prose, where differing values are expected.
    pub free_text_attributes: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            location_relations: [
                "located_in",
                "lives_in",
                "resides_in",
                "member_of",
                "based_in",
                "stationed_at",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            free_text_attributes: vec!["description".to_string()],
        }
    }
}

/// Confidence bands for the speculation classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeculationConfig {
    /// Strictly above this is firmly established.
    pub firm_above: f32,

    /// Strictly below this is speculative.
    pub speculative_below: f32,
}

impl Default for SpeculationConfig {
    fn default() -> Self {
        Self {
            firm_above: 0.8,
            speculative_below: 0.5,
        }
    }
}

/// Canon hierarchy: source id or source category -> precedence (lower wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonConfig {
    pub ranking: BTreeMap<String, i64>,
}

impl Default for CanonConfig {
    fn default() -> Self {
        let ranking = [
            ("primary_novel", 1),
            ("author_statements", 2),
            ("sequel_novels", 3),
            ("official_adaptations", 4),
            ("licensed_spinoffs", 5),
            ("official_companion_books", 6),
            ("fan_theories", 10),
        ]
        .into_iter()
        .map(|(label, rank)| (label.to_string(), rank))
        .collect();
        Self { ranking }
    }
}
