//! The extraction oracle boundary.
//!
//! The oracle is an external service (an LLM or an NER tagger) that turns text into
//! structured narrative facts. Everything behind this trait is out of scope for the
//! engine; implementations return raw text and the adapter does all validation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

use crate::config::OracleConfig;
use crate::error::{ExtractionError, OracleError};

/// Input for one extraction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    pub document_text: String,
    pub source_type: String,
    pub source_name: String,
}

/// A world rule handed to the oracle for a consistency review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleContext {
    pub id: String,
    pub name: String,
    pub description: String,
    pub sources: Vec<String>,
}

/// External text-extraction service.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Extract entities, relationships, timeline events and world rules as JSON text.
    async fn extract(&self, request: &OracleRequest) -> Result<String, OracleError>;

    /// Review world rules for logical conflicts, returning
    /// `{"contradictions": [{"rules": [..], "description": .., "confidence": ..}]}` as text.
    async fn review_rules(&self, rules: &[RuleContext]) -> Result<String, OracleError>;
}

/// Run an oracle call with a per-attempt timeout and exponential backoff between retries.
///
/// Timeouts and unavailability are both transient; once retries are exhausted the last
/// failure is reported as [`ExtractionError::OracleUnavailable`].
pub async fn call_with_retry<F, Fut>(policy: &OracleConfig, mut call: F) -> Result<String, ExtractionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, OracleError>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_error = OracleError::Unavailable("no attempt made".into());

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.backoff(attempt - 1)).await;
        }

        let outcome = match tokio::time::timeout(policy.timeout(), call()).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(policy.timeout_ms)),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(err) => {
                warn!(attempt, attempts, error = %err, "oracle call failed");
                last_error = err;
            }
        }
    }

    Err(ExtractionError::OracleUnavailable {
        attempts,
        reason: last_error.to_string(),
    })
}
