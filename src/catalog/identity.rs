use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;

/// Stable identifier for a concept entry (e.g. `pain-location`).
///
/// Ids are unique within a resolved registry; template expansion derives new
/// ids by rewriting the prefix of an existing one.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(pub String);

impl ConceptId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replace a literal `prefix` with `replacement`, if this id starts with it.
    ///
    /// `pain-location` rewritten from `pain` to `headache` yields
    /// `headache-location`. The match is textual, not segment-aware.
    pub fn rewrite_prefix(&self, prefix: &str, replacement: &str) -> Option<ConceptId> {
        self.0
            .strip_prefix(prefix)
            .map(|suffix| ConceptId(format!("{replacement}{suffix}")))
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ConceptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConceptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Declared `type` of a concept.
///
/// Known primitive tags keep serialization consistent; `Other` carries every
/// other tag, including the id of another concept when the concept is a
/// template.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConceptType {
    ValueSet,
    Value,
    MeasureUnit,
    Boolean,
    Event,
    ExclusiveChoice,
    InclusiveChoice,
    Block,
    Column,
    Root,
    Aggregate,
    Other(String),
}

impl Serialize for ConceptType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConceptType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl fmt::Display for ConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConceptType {
    pub fn as_str(&self) -> &str {
        match self {
            ConceptType::ValueSet => "value-set",
            ConceptType::Value => "value",
            ConceptType::MeasureUnit => "measure-unit",
            ConceptType::Boolean => "boolean",
            ConceptType::Event => "event",
            ConceptType::ExclusiveChoice => "exclusive-choice",
            ConceptType::InclusiveChoice => "inclusive-choice",
            ConceptType::Block => "block",
            ConceptType::Column => "column",
            ConceptType::Root => "root",
            ConceptType::Aggregate => "aggregate",
            ConceptType::Other(value) => value.as_str(),
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "value-set" => ConceptType::ValueSet,
            "value" => ConceptType::Value,
            "measure-unit" => ConceptType::MeasureUnit,
            "boolean" => ConceptType::Boolean,
            "event" => ConceptType::Event,
            "exclusive-choice" => ConceptType::ExclusiveChoice,
            "inclusive-choice" => ConceptType::InclusiveChoice,
            "block" => ConceptType::Block,
            "column" => ConceptType::Column,
            "root" => ConceptType::Root,
            "aggregate" => ConceptType::Aggregate,
            other => ConceptType::Other(other.to_string()),
        }
    }

    /// Lower-cased tag as written to the translation spreadsheet.
    pub fn sheet_tag(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether entries of this type get a `placeholder` label.
    pub fn takes_placeholder(&self) -> bool {
        !matches!(
            self.sheet_tag().as_str(),
            "value" | "block" | "column" | "root" | "aggregate"
        )
    }

    /// Whether entries of this type carry `value-true`/`value-false` labels.
    pub fn has_boolean_labels(&self) -> bool {
        matches!(self.sheet_tag().as_str(), "event" | "boolean")
    }
}

/// Structural properties that may hold nested concept definitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SlotKind {
    Values,
    Concepts,
    Data,
    EnableData,
    Components,
}

impl SlotKind {
    /// Every slot, in the order promotion visits them.
    pub const ALL: [SlotKind; 5] = [
        SlotKind::Values,
        SlotKind::Concepts,
        SlotKind::Data,
        SlotKind::EnableData,
        SlotKind::Components,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Values => "values",
            SlotKind::Concepts => "concepts",
            SlotKind::Data => "data",
            SlotKind::EnableData => "enable-data",
            SlotKind::Components => "components",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        SlotKind::ALL.into_iter().find(|slot| slot.as_str() == key)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_type_round_trips_known_and_unknown() {
        let known = ConceptType::ExclusiveChoice;
        let json = serde_json::to_string(&known).unwrap();
        assert_eq!(json.trim_matches('"'), "exclusive-choice");
        let back: ConceptType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, known);

        let template_json = "\"pain\"";
        let parsed: ConceptType = serde_json::from_str(template_json).unwrap();
        assert_eq!(parsed, ConceptType::Other("pain".to_string()));
        let serialized = serde_json::to_string(&parsed).unwrap();
        assert_eq!(serialized, template_json);
    }

    #[test]
    fn rewrite_prefix_is_literal() {
        let id = ConceptId::from("pain-location");
        assert_eq!(
            id.rewrite_prefix("pain", "headache"),
            Some(ConceptId::from("headache-location"))
        );
        assert_eq!(id.rewrite_prefix("ache", "x"), None);

        // Textual match: `painkiller` also starts with `pain`.
        let other = ConceptId::from("painkiller");
        assert_eq!(
            other.rewrite_prefix("pain", "head"),
            Some(ConceptId::from("headkiller"))
        );
    }

    #[test]
    fn label_rules_follow_type() {
        assert!(ConceptType::Boolean.has_boolean_labels());
        assert!(ConceptType::from_str("Event").has_boolean_labels());
        assert!(!ConceptType::ValueSet.has_boolean_labels());

        assert!(!ConceptType::Value.takes_placeholder());
        assert!(!ConceptType::Block.takes_placeholder());
        assert!(ConceptType::Other("symptom".into()).takes_placeholder());
    }

    #[test]
    fn slot_kinds_parse_from_keys() {
        assert_eq!(SlotKind::from_key("enable-data"), Some(SlotKind::EnableData));
        assert_eq!(SlotKind::from_key("enable_data"), None);
        let keys: Vec<_> = SlotKind::ALL.iter().map(|slot| slot.as_str()).collect();
        assert_eq!(
            keys,
            vec!["values", "concepts", "data", "enable-data", "components"]
        );
    }

    #[test]
    fn concept_id_serializes_transparently() {
        let id = ConceptId::from("pain-location");
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"pain-location\"");
        let parsed: ConceptId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, id);
    }
}
