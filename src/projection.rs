//! Downstream views over a resolved registry.
//!
//! Two consumers read the registry after resolution: the translation
//! spreadsheet sync, which files every concept under a worksheet together
//! with its type and label target, and the label extractor, which decides per
//! concept whether labels are inherited, implicit, or must be authored.

use crate::catalog::{ConceptDefinition, ConceptId, ConceptRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const FULL_NAME: &str = "full-name";
pub const LONG_LABEL: &str = "long-label";
pub const SHORT_LABEL: &str = "short-label";
pub const ABBREVIATION: &str = "abbreviation";
pub const PLACEHOLDER: &str = "placeholder";
pub const VALUE_TRUE: &str = "value-true";
pub const VALUE_FALSE: &str = "value-false";

/// Labels every concept carries in each language.
pub const LABEL_NAMES: [&str; 4] = [FULL_NAME, LONG_LABEL, SHORT_LABEL, ABBREVIATION];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Worksheet {
    #[serde(rename = "Concepts")]
    Concepts,
    #[serde(rename = "Concepts-Values")]
    ConceptValues,
}

impl Worksheet {
    pub fn as_str(self) -> &'static str {
        match self {
            Worksheet::Concepts => "Concepts",
            Worksheet::ConceptValues => "Concepts-Values",
        }
    }

    /// Worksheet a concept of this type is filed under.
    pub fn for_definition(definition: &ConceptDefinition) -> Self {
        match definition.kind.sheet_tag().as_str() {
            "value" | "value-set" | "measure-unit" => Worksheet::ConceptValues,
            _ => Worksheet::Concepts,
        }
    }
}

impl fmt::Display for Worksheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// One spreadsheet row: the concept, its lower-cased type and label target.
pub struct ConceptRow {
    pub concept: ConceptId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target: String,
    pub worksheet: Worksheet,
}

impl ConceptRow {
    pub fn new(id: &ConceptId, definition: &ConceptDefinition) -> Self {
        Self {
            concept: id.clone(),
            kind: definition.kind.sheet_tag(),
            target: definition.target().unwrap_or_default().to_string(),
            worksheet: Worksheet::for_definition(definition),
        }
    }
}

/// Sheet rows for every registry entry, in id order.
pub fn concept_rows(registry: &ConceptRegistry) -> Vec<ConceptRow> {
    registry
        .iter()
        .map(|(id, definition)| ConceptRow::new(id, definition))
        .collect()
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
/// Changes needed to bring existing worksheet rows in line with a registry.
pub struct SheetSync {
    /// Rows whose type or target changed.
    pub updated: Vec<ConceptRow>,
    /// Rows naming concepts that are no longer in the registry.
    pub cleared: Vec<ConceptId>,
    /// Registry entries without a row in either worksheet.
    pub added: Vec<ConceptRow>,
    /// Concepts listed in more than one worksheet.
    pub conflicts: Vec<ConceptId>,
}

impl SheetSync {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.cleared.is_empty()
            && self.added.is_empty()
            && self.conflicts.is_empty()
    }
}

/// Diff existing worksheet rows against the registry.
///
/// Existing rows keep their worksheet; only new concepts are filed by type.
/// Cleared rows are reported only when they still carry a type.
pub fn sync_rows(registry: &ConceptRegistry, existing: &[ConceptRow]) -> SheetSync {
    let mut sync = SheetSync::default();
    let mut sheets: BTreeMap<&ConceptId, BTreeSet<Worksheet>> = BTreeMap::new();

    for row in existing {
        sheets.entry(&row.concept).or_default().insert(row.worksheet);
        match registry.get(row.concept.as_str()) {
            None => {
                if !row.kind.is_empty() {
                    sync.cleared.push(row.concept.clone());
                }
            }
            Some(definition) => {
                let mut expected = ConceptRow::new(&row.concept, definition);
                expected.worksheet = row.worksheet;
                if expected.kind != row.kind || expected.target != row.target {
                    sync.updated.push(expected);
                }
            }
        }
    }

    sync.conflicts = sheets
        .iter()
        .filter(|(_, worksheets)| worksheets.len() > 1)
        .map(|(id, _)| (*id).clone())
        .collect();
    sync.added = registry
        .iter()
        .filter(|(id, _)| !sheets.contains_key(id))
        .map(|(id, definition)| ConceptRow::new(id, definition))
        .collect();
    sync
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum LabelSource {
    /// Falls back to the labels of another concept.
    Inherited { target: String },
    /// Marked `implicit` or `none`; the id stands in for labels.
    NotRequired,
    /// Labels must be authored.
    Required,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LabelPolicy {
    pub concept: ConceptId,
    #[serde(flatten)]
    pub source: LabelSource,
    /// Authored `label` hint, mapped to the label name it selects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specified: Option<String>,
    pub placeholder: bool,
    pub boolean_labels: bool,
}

impl LabelPolicy {
    /// Fallback value for `label` in one language when none is authored.
    pub fn fallback(&self, label: &str) -> Option<String> {
        match &self.source {
            LabelSource::Inherited { target } => Some(label_reference(target, label)),
            LabelSource::NotRequired => Some(implicit_label(&self.concept)),
            LabelSource::Required => None,
        }
    }
}

pub fn label_policy(id: &ConceptId, definition: &ConceptDefinition) -> LabelPolicy {
    let specified = definition.label.as_deref().map(specified_label);
    let source = match definition.target() {
        Some(target) => LabelSource::Inherited {
            target: target.to_string(),
        },
        None if matches!(specified.as_deref(), Some("implicit" | "none")) => {
            LabelSource::NotRequired
        }
        None => LabelSource::Required,
    };
    LabelPolicy {
        concept: id.clone(),
        source,
        specified,
        placeholder: definition.kind.takes_placeholder(),
        boolean_labels: definition.kind.has_boolean_labels(),
    }
}

pub fn label_policies(registry: &ConceptRegistry) -> Vec<LabelPolicy> {
    registry
        .iter()
        .map(|(id, definition)| label_policy(id, definition))
        .collect()
}

/// Translation reference to another concept's label.
pub fn label_reference(target: &str, label: &str) -> String {
    format!("@:concept.{target}.{label}")
}

/// Display form of an id used when labels are not required:
/// `pain-location` becomes `Pain Location`.
pub fn implicit_label(id: &ConceptId) -> String {
    id.as_str()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Marker written for labels that still need a translation.
pub fn placeholder_label(id: &ConceptId) -> String {
    format!("[*{}*]", id.as_str().to_uppercase())
}

fn specified_label(label: &str) -> String {
    match label.to_lowercase().as_str() {
        "short" => SHORT_LABEL.to_string(),
        "long" => LONG_LABEL.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConceptCatalog, ConceptType};
    use crate::diagnostics::NullSink;
    use crate::resolve::resolve_catalog;
    use serde_json::json;

    fn registry(value: serde_json::Value) -> ConceptRegistry {
        let catalog = ConceptCatalog::from_value(&value).unwrap();
        resolve_catalog(&catalog, &NullSink).unwrap()
    }

    #[test]
    fn rows_use_target_priority_and_worksheet_by_type() {
        let registry = registry(json!({
            "headache": {"type": "pain"},
            "pain": {"type": "Symptom", "values": {"pain-location": {"type": "value-set"}}},
            "pain-scale": {"type": "measure-unit", "value-set": "scales", "path": ["a", "b"]},
            "exam-site": {"type": "value", "path": ["exam", "site"]},
            "fever": {"type": "boolean"}
        }));
        let rows: BTreeMap<_, _> = concept_rows(&registry)
            .into_iter()
            .map(|row| (row.concept.clone(), row))
            .collect();

        let headache = &rows[&ConceptId::from("headache")];
        assert_eq!(headache.kind, "symptom");
        assert_eq!(headache.target, "pain");
        assert_eq!(headache.worksheet, Worksheet::Concepts);

        assert_eq!(rows[&ConceptId::from("headache-location")].target, "pain-location");
        assert_eq!(
            rows[&ConceptId::from("pain-location")].worksheet,
            Worksheet::ConceptValues
        );
        assert_eq!(rows[&ConceptId::from("pain-scale")].target, "scales");
        assert_eq!(rows[&ConceptId::from("exam-site")].target, "site");
        assert_eq!(rows[&ConceptId::from("fever")].target, "");
    }

    #[test]
    fn sync_reports_updates_clears_additions_and_conflicts() {
        let registry = registry(json!({
            "fever": {"type": "boolean"},
            "pain": {"type": "symptom"},
            "pain-scale": {"type": "value"}
        }));
        let existing = vec![
            ConceptRow {
                concept: "fever".into(),
                kind: "event".to_string(),
                target: String::new(),
                worksheet: Worksheet::Concepts,
            },
            ConceptRow {
                concept: "pain".into(),
                kind: "symptom".to_string(),
                target: String::new(),
                worksheet: Worksheet::Concepts,
            },
            ConceptRow {
                concept: "pain".into(),
                kind: "symptom".to_string(),
                target: String::new(),
                worksheet: Worksheet::ConceptValues,
            },
            ConceptRow {
                concept: "retired".into(),
                kind: "value".to_string(),
                target: String::new(),
                worksheet: Worksheet::ConceptValues,
            },
            ConceptRow {
                concept: "blank".into(),
                kind: String::new(),
                target: String::new(),
                worksheet: Worksheet::ConceptValues,
            },
        ];
        let sync = sync_rows(&registry, &existing);

        assert_eq!(sync.updated.len(), 1);
        assert_eq!(sync.updated[0].concept.as_str(), "fever");
        assert_eq!(sync.updated[0].kind, "boolean");
        assert_eq!(sync.cleared, vec![ConceptId::from("retired")]);
        assert_eq!(sync.conflicts, vec![ConceptId::from("pain")]);
        assert_eq!(sync.added.len(), 1);
        assert_eq!(sync.added[0].concept.as_str(), "pain-scale");
        assert_eq!(sync.added[0].worksheet, Worksheet::ConceptValues);
    }

    #[test]
    fn label_policy_prefers_target_then_label_hint() {
        let mut definition = ConceptDefinition::new(ConceptType::Boolean);
        definition.label = Some("Implicit".to_string());
        let policy = label_policy(&"has-fever".into(), &definition);
        assert_eq!(policy.source, LabelSource::NotRequired);
        assert!(policy.boolean_labels);
        assert!(policy.placeholder);
        assert_eq!(policy.fallback(FULL_NAME).as_deref(), Some("Has Fever"));

        definition.original = Some("fever".into());
        let policy = label_policy(&"has-fever".into(), &definition);
        assert_eq!(
            policy.fallback(SHORT_LABEL).as_deref(),
            Some("@:concept.fever.short-label")
        );

        let mut block = ConceptDefinition::new(ConceptType::Block);
        block.label = Some("short".to_string());
        let policy = label_policy(&"exam".into(), &block);
        assert_eq!(policy.source, LabelSource::Required);
        assert_eq!(policy.specified.as_deref(), Some(SHORT_LABEL));
        assert!(!policy.placeholder);
        assert_eq!(policy.fallback(FULL_NAME), None);
    }

    #[test]
    fn placeholder_labels_shout_the_id() {
        assert_eq!(placeholder_label(&"pain-site".into()), "[*PAIN-SITE*]");
        assert_eq!(implicit_label(&"pain_site  left".into()), "Pain Site Left");
    }
}
