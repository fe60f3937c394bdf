//! Id-keyed views over concept definitions.
//!
//! `ConceptCatalog` is the raw, authored input handed to resolution;
//! `ConceptRegistry` is the flat, reference-normalized output. Both keep
//! entries in a `BTreeMap` so iteration and serialized output are stable.

use crate::catalog::identity::ConceptId;
use crate::catalog::model::ConceptDefinition;
use crate::error::{ConceptError, ConceptResult};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq)]
/// Raw concept catalog as authored, possibly merged from several files.
pub struct ConceptCatalog {
    entries: BTreeMap<ConceptId, ConceptDefinition>,
}

impl ConceptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from a mapping of id to definition.
    pub fn from_value(value: &Value) -> ConceptResult<Self> {
        let Value::Object(fields) = value else {
            return Err(ConceptError::invalid(
                &ConceptId::from("<catalog>"),
                "catalog must be a mapping of concept ids",
            ));
        };
        let mut catalog = Self::new();
        for (key, definition) in fields {
            let id = ConceptId::from(key.as_str());
            let definition = ConceptDefinition::from_value(&id, definition)?;
            catalog.entries.insert(id, definition);
        }
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&ConceptDefinition> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterates entries in stable id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConceptId, &ConceptDefinition)> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConceptId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ConceptId, ConceptDefinition)> for ConceptCatalog {
    fn from_iter<I: IntoIterator<Item = (ConceptId, ConceptDefinition)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Flat, fully resolved registry. Entries are never mutated once built.
pub struct ConceptRegistry {
    entries: BTreeMap<ConceptId, ConceptDefinition>,
}

impl ConceptRegistry {
    pub(crate) fn from_entries(entries: BTreeMap<ConceptId, ConceptDefinition>) -> Self {
        Self { entries }
    }

    /// Resolve a concept by id.
    ///
    /// Returns `None` instead of erroring; callers surface errors with the
    /// context that referenced the missing id.
    pub fn get(&self, id: &str) -> Option<&ConceptDefinition> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConceptId, &ConceptDefinition)> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConceptId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ConceptRegistry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.entries.serialize(serializer)
    }
}
