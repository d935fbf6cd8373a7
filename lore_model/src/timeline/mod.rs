//! Timeline events and their timestamps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::documents::DocumentId;
use crate::entities::Confidence;

/// Position of an event in story time.
///
/// Ordering is total: ordinals sort before dates, which sort before free-text labels.
/// A single timeline is expected to use one format; mixing them still sorts
/// deterministically but carries no narrative meaning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Numeric position (year, chapter, day count).
    Ordinal(i64),
    /// Calendar date.
    Date(NaiveDate),
    /// Unparsed reference, ordered lexically.
    Label(String),
}

impl Timestamp {
    /// Parse a time reference as produced by an extractor.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if let Ok(ordinal) = reference.parse::<i64>() {
            return Timestamp::Ordinal(ordinal);
        }
        if let Ok(date) = NaiveDate::parse_from_str(reference, "%Y-%m-%d") {
            return Timestamp::Date(date);
        }
        Timestamp::Label(reference.to_string())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timestamp::Ordinal(n) => write!(f, "{}", n),
            Timestamp::Date(d) => write!(f, "{}", d),
            Timestamp::Label(s) => f.write_str(s),
        }
    }
}

/// A dated event in one entity's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub description: String,
    pub timestamp: Timestamp,

    /// Description of an event this one is declared to follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,

    pub document: DocumentId,
    pub confidence: Confidence,
}

impl TimelineEvent {
    pub fn new(
        description: impl Into<String>,
        timestamp: Timestamp,
        document: DocumentId,
        confidence: Confidence,
    ) -> Self {
        Self {
            description: description.into(),
            timestamp,
            after: None,
            document,
            confidence,
        }
    }

    pub fn with_after(mut self, predecessor: impl Into<String>) -> Self {
        self.after = Some(predecessor.into());
        self
    }

    /// Whether this event declares that it happens after `other`, either through the
    /// explicit `after` field or a description of the form "... after <other> ...".
    pub fn declares_after(&self, other: &TimelineEvent) -> bool {
        let other_text = other.description.trim().to_lowercase();
        if other_text.is_empty() {
            return false;
        }
        if let Some(after) = &self.after {
            if after.trim().to_lowercase() == other_text {
                return true;
            }
        }
        self.description
            .to_lowercase()
            .contains(&format!("after {}", other_text))
    }

    /// Whether two events record the same statement from the same document.
    pub fn same_assertion(&self, other: &TimelineEvent) -> bool {
        self.description == other.description
            && self.timestamp == other.timestamp
            && self.document == other.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentId {
        DocumentId::new("D1").unwrap()
    }

    #[test]
    fn test_timestamp_parse() {
        assert_eq!(Timestamp::parse(" 42 "), Timestamp::Ordinal(42));
        assert_eq!(
            Timestamp::parse("1066-10-14"),
            Timestamp::Date(NaiveDate::from_ymd_opt(1066, 10, 14).unwrap())
        );
        assert_eq!(
            Timestamp::parse("the second winter"),
            Timestamp::Label("the second winter".into())
        );
    }

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp::Ordinal(-5) < Timestamp::Ordinal(3));
        assert!(Timestamp::parse("2001-01-01") < Timestamp::parse("2001-02-01"));
        assert!(Timestamp::Ordinal(i64::MAX) < Timestamp::parse("2001-01-01"));
    }

    #[test]
    fn test_declares_after_explicit() {
        let coronation = TimelineEvent::new("Coronation", Timestamp::Ordinal(5), doc(), Confidence::CERTAIN);
        let exile = TimelineEvent::new("Exile", Timestamp::Ordinal(3), doc(), Confidence::CERTAIN)
            .with_after("coronation");
        assert!(exile.declares_after(&coronation));
        assert!(!coronation.declares_after(&exile));
    }

    #[test]
    fn test_declares_after_in_description() {
        let battle = TimelineEvent::new("The Battle of Ash", Timestamp::Ordinal(10), doc(), Confidence::CERTAIN);
        let flight = TimelineEvent::new(
            "Aria flees north after the battle of ash",
            Timestamp::Ordinal(4),
            doc(),
            Confidence::CERTAIN,
        );
        assert!(flight.declares_after(&battle));
    }
}
