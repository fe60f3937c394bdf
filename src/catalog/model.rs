//! In-memory representation of one concept definition.
//!
//! The catalog loader decides, once, what every structural slot holds: a
//! reference, a list of references, inline definitions, or a mix. The
//! resolution engine only ever matches on these tags and never inspects the
//! shape of raw values. `to_value` renders a definition back into the catalog
//! key layout for output.

use crate::catalog::identity::{ConceptId, ConceptType, SlotKind};
use crate::error::{ConceptError, ConceptResult};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const TYPE_KEY: &str = "type";
const ORIGINAL_KEY: &str = "original";
const TYPES_KEY: &str = "types";
const ENABLE_CONDITION_KEY: &str = "enable-condition";
const VALUE_SET_KEY: &str = "value-set";
const LABEL_KEY: &str = "label";
const MULTIPLE_KEY: &str = "multiple";
const PATH_KEY: &str = "path";

#[derive(Clone, Debug, PartialEq)]
/// One catalog or registry entry.
pub struct ConceptDefinition {
    pub kind: ConceptType,
    pub slots: BTreeMap<SlotKind, Slot>,
    /// Explicit renames applied when this concept is expanded from a template.
    pub types: BTreeMap<ConceptId, ConceptId>,
    pub enable_condition: Option<Value>,
    pub value_set: Option<String>,
    pub label: Option<String>,
    pub multiple: Option<bool>,
    pub path: Option<ConceptPath>,
    /// Concept this entry was derived from; set by the engine only.
    pub original: Option<ConceptId>,
    /// Authored attributes the engine does not interpret.
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
/// Content of a structural slot.
pub enum Slot {
    Reference(ConceptId),
    ReferenceList(Vec<ConceptId>),
    /// A nested mapping: each key declares one concept, in authored order.
    Inline(Vec<InlineConcept>),
    /// A list mixing references and inline declarations.
    List(Vec<SlotEntry>),
    /// Scalars other than strings, passed through untouched.
    Literal(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SlotEntry {
    Reference(ConceptId),
    Inline(InlineConcept),
}

#[derive(Clone, Debug, PartialEq)]
/// A concept declared inside another concept's slot.
pub struct InlineConcept {
    pub id: ConceptId,
    pub definition: ConceptDefinition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConceptPath {
    Single(String),
    Segments(Vec<String>),
}

impl ConceptDefinition {
    pub fn new(kind: ConceptType) -> Self {
        Self {
            kind,
            slots: BTreeMap::new(),
            types: BTreeMap::new(),
            enable_condition: None,
            value_set: None,
            label: None,
            multiple: None,
            path: None,
            original: None,
            extra: Map::new(),
        }
    }

    /// Placeholder definition for a derived child: only its type and source.
    pub fn stub(kind: ConceptType, original: ConceptId) -> Self {
        let mut stub = Self::new(kind);
        stub.original = Some(original);
        stub
    }

    pub fn slot(&self, kind: SlotKind) -> Option<&Slot> {
        self.slots.get(&kind)
    }

    /// True when no slot embeds a definition any more.
    pub fn is_reference_form(&self) -> bool {
        self.slots.values().all(Slot::is_reference_form)
    }

    /// Concept whose labels this entry falls back to: `original`, then the
    /// `value-set`, then the last `path` segment.
    pub fn target(&self) -> Option<&str> {
        if let Some(original) = self.original.as_ref().filter(|id| !id.0.is_empty()) {
            return Some(original.as_str());
        }
        if let Some(value_set) = self.value_set.as_deref().filter(|v| !v.is_empty()) {
            return Some(value_set);
        }
        self.path
            .as_ref()
            .and_then(ConceptPath::leaf)
            .filter(|leaf| !leaf.is_empty())
    }

    /// Parse a definition from its catalog form.
    pub fn from_value(id: &ConceptId, value: &Value) -> ConceptResult<Self> {
        let Value::Object(fields) = value else {
            return Err(ConceptError::invalid(id, "definition must be a mapping"));
        };

        let kind = match fields.get(TYPE_KEY) {
            Some(Value::String(tag)) if !tag.trim().is_empty() => ConceptType::from_str(tag),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(ConceptError::MissingType { id: id.clone() });
            }
            Some(_) => return Err(ConceptError::invalid(id, "type must be a string")),
        };

        let mut definition = ConceptDefinition::new(kind);
        for (key, field) in fields {
            match key.as_str() {
                TYPE_KEY => {}
                ORIGINAL_KEY => {
                    definition.original = optional_string(id, key, field)?.map(ConceptId)
                }
                TYPES_KEY => definition.types = parse_types(id, field)?,
                ENABLE_CONDITION_KEY => {
                    definition.enable_condition = Some(field.clone()).filter(|v| !v.is_null())
                }
                VALUE_SET_KEY => definition.value_set = optional_string(id, key, field)?,
                LABEL_KEY => definition.label = optional_string(id, key, field)?,
                MULTIPLE_KEY => {
                    definition.multiple = match field {
                        Value::Null => None,
                        Value::Bool(flag) => Some(*flag),
                        _ => return Err(ConceptError::invalid(id, "multiple must be a boolean")),
                    }
                }
                PATH_KEY => definition.path = ConceptPath::from_value(id, field)?,
                other => match SlotKind::from_key(other) {
                    Some(slot) => {
                        if let Some(parsed) = Slot::from_value(id, slot, field)? {
                            definition.slots.insert(slot, parsed);
                        }
                    }
                    None => {
                        definition.extra.insert(other.to_string(), field.clone());
                    }
                },
            }
        }
        Ok(definition)
    }

    /// Render the definition in catalog key layout.
    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(TYPE_KEY.into(), Value::String(self.kind.as_str().into()));
        if let Some(original) = &self.original {
            fields.insert(ORIGINAL_KEY.into(), Value::String(original.0.clone()));
        }
        for (kind, slot) in &self.slots {
            fields.insert(kind.as_str().into(), slot.to_value());
        }
        if !self.types.is_empty() {
            let types = self
                .types
                .iter()
                .map(|(from, to)| (from.0.clone(), Value::String(to.0.clone())))
                .collect();
            fields.insert(TYPES_KEY.into(), Value::Object(types));
        }
        if let Some(condition) = &self.enable_condition {
            fields.insert(ENABLE_CONDITION_KEY.into(), condition.clone());
        }
        if let Some(value_set) = &self.value_set {
            fields.insert(VALUE_SET_KEY.into(), Value::String(value_set.clone()));
        }
        if let Some(label) = &self.label {
            fields.insert(LABEL_KEY.into(), Value::String(label.clone()));
        }
        if let Some(multiple) = self.multiple {
            fields.insert(MULTIPLE_KEY.into(), Value::Bool(multiple));
        }
        if let Some(path) = &self.path {
            fields.insert(PATH_KEY.into(), path.to_value());
        }
        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }
        Value::Object(fields)
    }
}

impl Serialize for ConceptDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl Slot {
    /// Parse a slot value; `null` counts as an absent slot.
    pub fn from_value(owner: &ConceptId, kind: SlotKind, value: &Value) -> ConceptResult<Option<Self>> {
        let slot = match value {
            Value::Null => return Ok(None),
            Value::String(id) => Slot::Reference(ConceptId::from(id.as_str())),
            Value::Bool(_) | Value::Number(_) => Slot::Literal(value.clone()),
            Value::Object(entries) => Slot::Inline(parse_inline(owner, kind, entries)?),
            Value::Array(items) if items.iter().all(Value::is_string) => Slot::ReferenceList(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ConceptId::from)
                    .collect(),
            ),
            Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(id) => {
                            entries.push(SlotEntry::Reference(ConceptId::from(id.as_str())))
                        }
                        Value::Object(nested) => entries.extend(
                            parse_inline(owner, kind, nested)?
                                .into_iter()
                                .map(SlotEntry::Inline),
                        ),
                        _ => {
                            return Err(ConceptError::invalid(
                                owner,
                                format!("{kind} entries must be ids or inline mappings"),
                            ));
                        }
                    }
                }
                Slot::List(entries)
            }
        };
        Ok(Some(slot))
    }

    /// Rebuild a slot from cloned entries.
    ///
    /// `single` marks slots authored as one reference or one mapping; those
    /// collapse back to a plain reference when a single id remains.
    pub(crate) fn from_entries(entries: Vec<SlotEntry>, single: bool) -> Self {
        let all_references = entries
            .iter()
            .all(|entry| matches!(entry, SlotEntry::Reference(_)));
        let all_inline = entries
            .iter()
            .all(|entry| matches!(entry, SlotEntry::Inline(_)));

        if all_references {
            let mut ids: Vec<ConceptId> = entries.into_iter().map(SlotEntry::into_id).collect();
            if single && ids.len() == 1 {
                return Slot::Reference(ids.remove(0));
            }
            return Slot::ReferenceList(ids);
        }
        if single && all_inline {
            return Slot::Inline(
                entries
                    .into_iter()
                    .filter_map(|entry| match entry {
                        SlotEntry::Inline(inline) => Some(inline),
                        SlotEntry::Reference(_) => None,
                    })
                    .collect(),
            );
        }
        Slot::List(entries)
    }

    pub fn is_reference_form(&self) -> bool {
        matches!(
            self,
            Slot::Reference(_) | Slot::ReferenceList(_) | Slot::Literal(_)
        )
    }

    /// Ids this slot refers to or declares, in order.
    pub fn ids(&self) -> Vec<&ConceptId> {
        match self {
            Slot::Reference(id) => vec![id],
            Slot::ReferenceList(ids) => ids.iter().collect(),
            Slot::Inline(children) => children.iter().map(|child| &child.id).collect(),
            Slot::List(entries) => entries.iter().map(SlotEntry::id).collect(),
            Slot::Literal(_) => Vec::new(),
        }
    }

    /// Split into the reference form and the inline declarations it held.
    pub fn into_reference_form(self) -> (Slot, Vec<InlineConcept>) {
        match self {
            Slot::Inline(children) => {
                let reference = if children.len() == 1 {
                    Slot::Reference(children[0].id.clone())
                } else {
                    Slot::ReferenceList(children.iter().map(|child| child.id.clone()).collect())
                };
                (reference, children)
            }
            Slot::List(entries) => {
                let mut ids = Vec::with_capacity(entries.len());
                let mut children = Vec::new();
                for entry in entries {
                    match entry {
                        SlotEntry::Reference(id) => ids.push(id),
                        SlotEntry::Inline(inline) => {
                            ids.push(inline.id.clone());
                            children.push(inline);
                        }
                    }
                }
                (Slot::ReferenceList(ids), children)
            }
            resolved => (resolved, Vec::new()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Slot::Reference(id) => Value::String(id.0.clone()),
            Slot::ReferenceList(ids) => {
                Value::Array(ids.iter().map(|id| Value::String(id.0.clone())).collect())
            }
            Slot::Inline(children) => Value::Object(
                children
                    .iter()
                    .map(|child| (child.id.0.clone(), child.definition.to_value()))
                    .collect(),
            ),
            Slot::List(entries) => Value::Array(entries.iter().map(SlotEntry::to_value).collect()),
            Slot::Literal(value) => value.clone(),
        }
    }
}

impl SlotEntry {
    pub fn id(&self) -> &ConceptId {
        match self {
            SlotEntry::Reference(id) => id,
            SlotEntry::Inline(inline) => &inline.id,
        }
    }

    fn into_id(self) -> ConceptId {
        match self {
            SlotEntry::Reference(id) => id,
            SlotEntry::Inline(inline) => inline.id,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            SlotEntry::Reference(id) => Value::String(id.0.clone()),
            SlotEntry::Inline(inline) => {
                let mut mapping = Map::new();
                mapping.insert(inline.id.0.clone(), inline.definition.to_value());
                Value::Object(mapping)
            }
        }
    }
}

impl ConceptPath {
    /// Last path segment.
    pub fn leaf(&self) -> Option<&str> {
        match self {
            ConceptPath::Single(path) => Some(path.as_str()),
            ConceptPath::Segments(segments) => segments.last().map(String::as_str),
        }
    }

    fn from_value(id: &ConceptId, value: &Value) -> ConceptResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(path) => Ok(Some(ConceptPath::Single(path.clone()))),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ConceptError::invalid(id, "path segments must be strings"))
                })
                .collect::<ConceptResult<Vec<_>>>()
                .map(|segments| Some(ConceptPath::Segments(segments))),
            _ => Err(ConceptError::invalid(
                id,
                "path must be a string or a list of strings",
            )),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            ConceptPath::Single(path) => Value::String(path.clone()),
            ConceptPath::Segments(segments) => {
                Value::Array(segments.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

fn parse_inline(
    owner: &ConceptId,
    kind: SlotKind,
    entries: &Map<String, Value>,
) -> ConceptResult<Vec<InlineConcept>> {
    if entries.is_empty() {
        return Err(ConceptError::invalid(
            owner,
            format!("{kind} holds an empty inline mapping"),
        ));
    }
    entries
        .iter()
        .map(|(key, nested)| {
            let id = ConceptId::from(key.as_str());
            let definition = ConceptDefinition::from_value(&id, nested)?;
            Ok(InlineConcept { id, definition })
        })
        .collect()
}

fn parse_types(id: &ConceptId, value: &Value) -> ConceptResult<BTreeMap<ConceptId, ConceptId>> {
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(entries) => entries
            .iter()
            .map(|(from, to)| match to {
                Value::String(to) => Ok((ConceptId::from(from.as_str()), ConceptId::from(to.as_str()))),
                _ => Err(ConceptError::invalid(
                    id,
                    format!("types.{from} must name a concept id"),
                )),
            })
            .collect(),
        _ => Err(ConceptError::invalid(id, "types must be a mapping of ids")),
    }
}

fn optional_string(id: &ConceptId, key: &str, value: &Value) -> ConceptResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        _ => Err(ConceptError::invalid(id, format!("{key} must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(id: &str, value: Value) -> ConceptResult<ConceptDefinition> {
        ConceptDefinition::from_value(&ConceptId::from(id), &value)
    }

    #[test]
    fn parses_inline_mapping_slot() {
        let definition = parse(
            "pain",
            json!({"type": "symptom", "values": {"pain-location": {"type": "value-set"}}}),
        )
        .unwrap();
        assert_eq!(definition.kind, ConceptType::Other("symptom".into()));
        let Some(Slot::Inline(children)) = definition.slot(SlotKind::Values) else {
            panic!("values should be inline");
        };
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id.as_str(), "pain-location");
        assert_eq!(children[0].definition.kind, ConceptType::ValueSet);
        assert!(!definition.is_reference_form());
    }

    #[test]
    fn parses_mixed_list_in_order() {
        let definition = parse(
            "exam",
            json!({
                "type": "block",
                "concepts": [
                    "shared",
                    {"exam-a": {"type": "boolean"}, "exam-b": {"type": "event"}},
                    "other"
                ]
            }),
        )
        .unwrap();
        let slot = definition.slot(SlotKind::Concepts).unwrap();
        let ids: Vec<_> = slot.ids().into_iter().map(ConceptId::as_str).collect();
        assert_eq!(ids, vec!["shared", "exam-a", "exam-b", "other"]);
        assert!(matches!(slot, Slot::List(_)));
    }

    #[test]
    fn plain_lists_are_reference_lists() {
        let definition = parse("exam", json!({"type": "block", "data": ["a", "b"], "components": true}))
            .unwrap();
        assert_eq!(
            definition.slot(SlotKind::Data),
            Some(&Slot::ReferenceList(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            definition.slot(SlotKind::Components),
            Some(&Slot::Literal(json!(true)))
        );
        assert!(definition.is_reference_form());
    }

    #[test]
    fn missing_or_blank_type_is_reported() {
        let err = parse("nameless", json!({"label": "short"})).unwrap_err();
        assert_eq!(err, ConceptError::MissingType { id: "nameless".into() });

        let err = parse("blank", json!({"type": "  "})).unwrap_err();
        assert!(matches!(err, ConceptError::MissingType { .. }));

        let err = parse(
            "parent",
            json!({"type": "block", "values": {"child": {"label": "x"}}}),
        )
        .unwrap_err();
        assert_eq!(err, ConceptError::MissingType { id: "child".into() });
    }

    #[test]
    fn rejects_malformed_shapes() {
        assert!(matches!(
            parse("x", json!({"type": "block", "values": {}})),
            Err(ConceptError::InvalidDefinition { .. })
        ));
        assert!(matches!(
            parse("x", json!({"type": "block", "values": ["a", 3]})),
            Err(ConceptError::InvalidDefinition { .. })
        ));
        assert!(matches!(
            parse("x", json!({"type": "block", "types": {"a": 1}})),
            Err(ConceptError::InvalidDefinition { .. })
        ));
        assert!(matches!(
            parse("x", json!({"type": "block", "multiple": "yes"})),
            Err(ConceptError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn to_value_keeps_catalog_layout() {
        let source = json!({
            "type": "exclusive-choice",
            "values": ["a", "b"],
            "types": {"pain-location": "migraine-site"},
            "value-set": "locations",
            "label": "short",
            "multiple": true,
            "path": ["exam", "site"],
            "custom": {"kept": 1}
        });
        let definition = parse("choice", source.clone()).unwrap();
        assert_eq!(definition.to_value(), source);
        assert_eq!(definition.path.as_ref().and_then(ConceptPath::leaf), Some("site"));
        assert_eq!(definition.extra.get("custom"), Some(&json!({"kept": 1})));
    }

    #[test]
    fn reference_form_collapses_single_mappings() {
        let definition = parse(
            "pain",
            json!({"type": "symptom", "values": {"pain-location": {"type": "value-set"}}}),
        )
        .unwrap();
        let slot = definition.slots.get(&SlotKind::Values).cloned().unwrap();
        let (reference, children) = slot.into_reference_form();
        assert_eq!(reference, Slot::Reference("pain-location".into()));
        assert_eq!(children.len(), 1);

        let definition = parse(
            "exam",
            json!({"type": "block", "values": {"b": {"type": "value"}, "a": {"type": "value"}}}),
        )
        .unwrap();
        let slot = definition.slots.get(&SlotKind::Values).cloned().unwrap();
        let (reference, children) = slot.into_reference_form();
        assert_eq!(reference, Slot::ReferenceList(vec!["b".into(), "a".into()]));
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn target_prefers_original_then_value_set_then_path() {
        let mut definition = parse(
            "c",
            json!({"type": "value", "value-set": "vs", "path": ["a", "leaf"]}),
        )
        .unwrap();
        assert_eq!(definition.target(), Some("vs"));
        definition.original = Some("origin".into());
        assert_eq!(definition.target(), Some("origin"));
        definition.original = None;
        definition.value_set = None;
        assert_eq!(definition.target(), Some("leaf"));
        definition.path = None;
        assert_eq!(definition.target(), None);
    }
}
