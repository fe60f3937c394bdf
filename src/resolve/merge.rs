//! Concept Merger: flattens resolution sources into one registry.
//!
//! Sources are added in order and every id remembers the source that first
//! contributed it. A second contribution of the same id is always a
//! `DuplicateConcept` error naming both sources; nothing is ever overwritten.

use crate::catalog::{ConceptDefinition, ConceptId, ConceptRegistry};
use crate::error::{ConceptError, ConceptResult};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
/// Concepts produced by one named resolution source.
pub struct Contribution {
    pub source: String,
    pub concepts: BTreeMap<ConceptId, ConceptDefinition>,
}

impl Contribution {
    pub fn new(source: impl Into<String>, concepts: BTreeMap<ConceptId, ConceptDefinition>) -> Self {
        Self {
            source: source.into(),
            concepts,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConceptMerger {
    entries: BTreeMap<ConceptId, ConceptDefinition>,
    owners: BTreeMap<ConceptId, String>,
}

impl ConceptMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for `source` without storing a definition yet.
    pub fn claim(&mut self, id: &ConceptId, source: &str) -> ConceptResult<()> {
        self.check(id, source)?;
        self.owners.insert(id.clone(), source.to_string());
        Ok(())
    }

    /// Add every concept of one source, failing on the first collision.
    pub fn add<I>(&mut self, source: &str, concepts: I) -> ConceptResult<()>
    where
        I: IntoIterator<Item = (ConceptId, ConceptDefinition)>,
    {
        for (id, definition) in concepts {
            self.check(&id, source)?;
            self.owners.insert(id.clone(), source.to_string());
            self.entries.insert(id, definition);
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.owners.contains_key(id)
    }

    /// Source that contributed `id`, if any.
    pub fn owner(&self, id: &str) -> Option<&str> {
        self.owners.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_concepts(self) -> BTreeMap<ConceptId, ConceptDefinition> {
        self.entries
    }

    pub fn finish(self) -> ConceptRegistry {
        ConceptRegistry::from_entries(self.entries)
    }

    fn check(&self, id: &ConceptId, source: &str) -> ConceptResult<()> {
        match self.owners.get(id) {
            Some(first) => Err(ConceptError::DuplicateConcept {
                id: id.clone(),
                first: first.clone(),
                second: source.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Merge ordered contributions into a flat registry.
pub fn merge<I>(contributions: I) -> ConceptResult<ConceptRegistry>
where
    I: IntoIterator<Item = Contribution>,
{
    let mut merger = ConceptMerger::new();
    for contribution in contributions {
        merger.add(&contribution.source, contribution.concepts)?;
    }
    Ok(merger.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ConceptType;

    fn concepts(ids: &[&str]) -> BTreeMap<ConceptId, ConceptDefinition> {
        ids.iter()
            .map(|id| (ConceptId::from(*id), ConceptDefinition::new(ConceptType::Value)))
            .collect()
    }

    #[test]
    fn merge_returns_union_of_disjoint_sources() {
        let registry = merge([
            Contribution::new("catalog", concepts(&["a", "b"])),
            Contribution::new("a (extracted)", concepts(&["c"])),
        ])
        .unwrap();
        let ids: Vec<_> = registry.ids().map(ConceptId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_names_both_sources_of_a_duplicate() {
        let err = merge([
            Contribution::new("catalog", concepts(&["K", "x"])),
            Contribution::new("other", concepts(&["y"])),
            Contribution::new("pain (extracted)", concepts(&["K"])),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConceptError::DuplicateConcept {
                id: "K".into(),
                first: "catalog".to_string(),
                second: "pain (extracted)".to_string(),
            }
        );
    }

    #[test]
    fn claimed_ids_collide_with_later_entries() {
        let mut merger = ConceptMerger::new();
        merger.claim(&"pain".into(), "pain").unwrap();
        let err = merger
            .add("pain.values", concepts(&["pain"]))
            .unwrap_err();
        assert!(matches!(err, ConceptError::DuplicateConcept { .. }));
        assert!(merger.is_empty());
        assert_eq!(merger.owner("pain"), Some("pain"));
    }
}
