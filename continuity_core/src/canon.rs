//! Canon Resolver - picks the authoritative fact when sources disagree.
//!
//! Precedence comes from a caller-supplied ranking of source ids or source categories
//! (lower wins). Ties fall back to confidence, then to processing order, so the choice
//! is always one of the two inputs and never depends on anything but them.

use lore_model::{AttributeValue, Confidence, DocumentId, DocumentRecord, Relationship, TimelineEvent};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

/// Precedence given to sources missing from the ranking.
pub const UNRANKED: i64 = i64::MAX;

/// Source id or category label -> precedence. Lower is more authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonRanking(pub BTreeMap<String, i64>);

impl CanonRanking {
    pub fn new(table: BTreeMap<String, i64>) -> Self {
        Self(table)
    }

    /// Precedence of a document: its own entry first, then its category's, else [`UNRANKED`].
    pub fn precedence(&self, id: &DocumentId, record: Option<&DocumentRecord>) -> i64 {
        if let Some(rank) = self.0.get(id.as_str()) {
            return *rank;
        }
        record
            .and_then(|r| r.category.as_deref())
            .and_then(|category| self.0.get(category))
            .copied()
            .unwrap_or(UNRANKED)
    }
}

/// A fact that carries provenance and confidence.
pub trait CanonFact {
    fn source(&self) -> &DocumentId;
    fn confidence(&self) -> Confidence;
}

impl CanonFact for AttributeValue {
    fn source(&self) -> &DocumentId {
        &self.source
    }

    fn confidence(&self) -> Confidence {
        self.confidence
    }
}

impl CanonFact for Relationship {
    fn source(&self) -> &DocumentId {
        &self.document
    }

    fn confidence(&self) -> Confidence {
        self.confidence
    }
}

impl CanonFact for TimelineEvent {
    fn source(&self) -> &DocumentId {
        &self.document
    }

    fn confidence(&self) -> Confidence {
        self.confidence
    }
}

/// Which rule decided a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Precedence,
    Confidence,
    ProcessingOrder,
    /// Nothing distinguishes the facts; the first argument is kept.
    FirstArgument,
}

/// Resolver bound to a ranking and the document records it needs for tie-breaks.
#[derive(Debug, Clone, Copy)]
pub struct CanonResolver<'a> {
    ranking: &'a CanonRanking,
    documents: &'a BTreeMap<DocumentId, DocumentRecord>,
}

impl<'a> CanonResolver<'a> {
    pub fn new(ranking: &'a CanonRanking, documents: &'a BTreeMap<DocumentId, DocumentRecord>) -> Self {
        Self { ranking, documents }
    }

    fn precedence(&self, source: &DocumentId) -> i64 {
        self.ranking.precedence(source, self.documents.get(source))
    }

    fn ordinal(&self, source: &DocumentId) -> u64 {
        self.documents.get(source).map(|r| r.ordinal).unwrap_or(u64::MAX)
    }

    /// Pick the authoritative fact of the two.
    pub fn resolve<'f, F: CanonFact>(&self, a: &'f F, b: &'f F) -> &'f F {
        self.resolve_with_reason(a, b).0
    }

    /// Pick the authoritative fact and report which rule decided.
    pub fn resolve_with_reason<'f, F: CanonFact>(&self, a: &'f F, b: &'f F) -> (&'f F, Decision) {
        let by_precedence = self.precedence(a.source()).cmp(&self.precedence(b.source()));
        let by_confidence = Reverse(a.confidence()).cmp(&Reverse(b.confidence()));
        let by_order = self.ordinal(a.source()).cmp(&self.ordinal(b.source()));

        let (ordering, decision) = [
            (by_precedence, Decision::Precedence),
            (by_confidence, Decision::Confidence),
            (by_order, Decision::ProcessingOrder),
        ]
        .into_iter()
        .find(|(ordering, _)| *ordering != Ordering::Equal)
        .unwrap_or((Ordering::Equal, Decision::FirstArgument));

        match ordering {
            Ordering::Greater => (b, decision),
            _ => (a, decision),
        }
    }

    /// Fold a set of competing facts down to the authoritative one.
    pub fn resolve_all<'f, F: CanonFact>(&self, facts: impl IntoIterator<Item = &'f F>) -> Option<&'f F>
    where
        F: 'f,
    {
        facts
            .into_iter()
            .reduce(|winner, challenger| self.resolve(winner, challenger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    fn documents(entries: &[(&str, Option<&str>)]) -> BTreeMap<DocumentId, DocumentRecord> {
        entries
            .iter()
            .enumerate()
            .map(|(ordinal, (id, category))| {
                let record = DocumentRecord::new(doc(id), *id, category.map(String::from), ordinal as u64);
                (doc(id), record)
            })
            .collect()
    }

    fn ranking(entries: &[(&str, i64)]) -> CanonRanking {
        CanonRanking::new(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    fn value(v: &str, source: &str, confidence: f32) -> AttributeValue {
        AttributeValue::new(v, doc(source), Confidence::new(confidence))
    }

    #[test]
    fn test_higher_precedence_wins() {
        let docs = documents(&[("D1", None), ("D2", None)]);
        let ranking = ranking(&[("D1", 1), ("D2", 2)]);
        let resolver = CanonResolver::new(&ranking, &docs);

        let blue = value("blue", "D1", 0.5);
        let green = value("green", "D2", 0.99);

        assert_eq!(resolver.resolve(&blue, &green).value, "blue");
        assert_eq!(resolver.resolve(&green, &blue).value, "blue");
        assert_eq!(resolver.resolve_with_reason(&green, &blue).1, Decision::Precedence);
    }

    #[test]
    fn test_category_ranking() {
        let docs = documents(&[("wiki", Some("fan_theories")), ("book", Some("primary_novel"))]);
        let ranking = ranking(&[("primary_novel", 1), ("fan_theories", 10)]);
        let resolver = CanonResolver::new(&ranking, &docs);

        let fan = value("alive", "wiki", 0.9);
        let canon = value("dead", "book", 0.9);
        assert_eq!(resolver.resolve(&fan, &canon).value, "dead");
    }

    #[test]
    fn test_unranked_source_loses() {
        let docs = documents(&[("D1", None), ("D2", None)]);
        let ranking = ranking(&[("D2", 50)]);
        let resolver = CanonResolver::new(&ranking, &docs);

        let unranked = value("x", "D1", 1.0);
        let ranked = value("y", "D2", 0.1);
        assert_eq!(resolver.resolve(&unranked, &ranked).value, "y");
    }

    #[test]
    fn test_confidence_breaks_precedence_tie() {
        let docs = documents(&[("D1", None), ("D2", None)]);
        let ranking = ranking(&[("D1", 3), ("D2", 3)]);
        let resolver = CanonResolver::new(&ranking, &docs);

        let weak = value("weak", "D1", 0.4);
        let strong = value("strong", "D2", 0.8);
        assert_eq!(resolver.resolve_with_reason(&weak, &strong), (&strong, Decision::Confidence));
    }

    #[test]
    fn test_processing_order_breaks_full_tie() {
        let docs = documents(&[("D1", None), ("D2", None)]);
        let ranking = CanonRanking::default();
        let resolver = CanonResolver::new(&ranking, &docs);

        let early = value("early", "D1", 0.7);
        let late = value("late", "D2", 0.7);
        assert_eq!(resolver.resolve(&late, &early).value, "early");
        assert_eq!(resolver.resolve_with_reason(&late, &early).1, Decision::ProcessingOrder);
    }

    #[test]
    fn test_same_source_keeps_first_argument() {
        let docs = documents(&[("D1", None)]);
        let ranking = CanonRanking::default();
        let resolver = CanonResolver::new(&ranking, &docs);

        let a = value("a", "D1", 0.7);
        let b = value("b", "D1", 0.7);
        assert_eq!(resolver.resolve_with_reason(&a, &b), (&a, Decision::FirstArgument));
    }

    #[test]
    fn test_resolve_all() {
        let docs = documents(&[("D1", None), ("D2", None), ("D3", None)]);
        let ranking = ranking(&[("D2", 1)]);
        let resolver = CanonResolver::new(&ranking, &docs);

        let values = vec![value("a", "D1", 1.0), value("b", "D2", 0.2), value("c", "D3", 1.0)];
        assert_eq!(resolver.resolve_all(&values).unwrap().value, "b");
        assert!(resolver.resolve_all(&Vec::<AttributeValue>::new()).is_none());
    }

    proptest! {
        #[test]
        fn resolve_is_total_and_deterministic(
            rank_a in proptest::option::of(0i64..5),
            rank_b in proptest::option::of(0i64..5),
            conf_a in 0.0f32..=1.0,
            conf_b in 0.0f32..=1.0,
            swap_order in any::<bool>(),
        ) {
            let docs = if swap_order {
                documents(&[("B", None), ("A", None)])
            } else {
                documents(&[("A", None), ("B", None)])
            };
            let mut table = BTreeMap::new();
            if let Some(r) = rank_a { table.insert("A".to_string(), r); }
            if let Some(r) = rank_b { table.insert("B".to_string(), r); }
            let ranking = CanonRanking::new(table);
            let resolver = CanonResolver::new(&ranking, &docs);

            let a = value("a", "A", conf_a);
            let b = value("b", "B", conf_b);

            let first = resolver.resolve(&a, &b);
            let second = resolver.resolve(&a, &b);
            prop_assert!(std::ptr::eq(first, second));
            prop_assert!(std::ptr::eq(first, &a) || std::ptr::eq(first, &b));
            // Distinct sources always produce an order-independent answer.
            prop_assert_eq!(&first.value, &resolver.resolve(&b, &a).value);
        }
    }
}
