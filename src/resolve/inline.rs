//! Inline Concept Promoter.
//!
//! Visits the structural slots of a non-template concept in fixed order,
//! resolves every nested declaration recursively and rewrites the slot to its
//! reference form. Children of one parent are merged with the same
//! no-overwrite rule as the registry, so two declarations of one id fail.

use super::merge::ConceptMerger;
use super::{Resolution, Resolved, Resolver};
use crate::catalog::{ConceptCatalog, ConceptDefinition, ConceptId};
use crate::diagnostics::{DecisionKind, Diagnostic, DiagnosticSink};
use crate::error::ConceptResult;
use std::collections::BTreeMap;

impl Resolution<'_> {
    /// Promote the inline children of a non-template concept.
    pub fn promote(
        &self,
        definition: &ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<BTreeMap<ConceptId, ConceptDefinition>> {
        Ok(self
            .resolver()?
            .promote(definition.clone(), id)?
            .into_concepts(id))
    }
}

/// Promote the inline children of `definition` against `catalog`.
pub fn promote(
    definition: &ConceptDefinition,
    id: &ConceptId,
    catalog: &ConceptCatalog,
    sink: &dyn DiagnosticSink,
) -> ConceptResult<BTreeMap<ConceptId, ConceptDefinition>> {
    Resolution::prepare(catalog, sink)?.promote(definition, id)
}

impl Resolver<'_> {
    pub(crate) fn promote(
        &mut self,
        mut definition: ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<Resolved> {
        let mut merger = ConceptMerger::new();
        merger.claim(id, id.as_str())?;

        let slots = std::mem::take(&mut definition.slots);
        for (kind, slot) in slots {
            let (reference, children) = slot.into_reference_form();
            let source = format!("{id}.{kind}");
            for child in children {
                self.sink.record(Diagnostic::new(
                    DecisionKind::Inline,
                    id,
                    format!("{id} -> {} ({})", child.id, child.definition.kind),
                ));
                let resolved = self.resolve_owned(child.definition, &child.id)?;
                merger.add(
                    &source,
                    std::iter::once((child.id, resolved.definition)).chain(resolved.extracted),
                )?;
            }
            definition.slots.insert(kind, reference);
        }

        Ok(Resolved {
            definition,
            extracted: merger.into_concepts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConceptType, Slot, SlotKind};
    use crate::diagnostics::{CollectingSink, NullSink};
    use crate::error::ConceptError;
    use serde_json::{json, Value};

    fn parse(id: &str, value: Value) -> ConceptDefinition {
        ConceptDefinition::from_value(&ConceptId::from(id), &value).unwrap()
    }

    #[test]
    fn promotes_nested_children_recursively() {
        let catalog = ConceptCatalog::new();
        let exam = parse(
            "exam",
            json!({
                "type": "block",
                "concepts": {
                    "exam-head": {
                        "type": "block",
                        "values": {"exam-head-side": {"type": "value-set"}}
                    },
                    "exam-neck": {"type": "boolean"}
                },
                "label": "Exam"
            }),
        );
        let sink = CollectingSink::new();
        let concepts = promote(&exam, &"exam".into(), &catalog, &sink).unwrap();

        let ids: Vec<_> = concepts.keys().map(ConceptId::as_str).collect();
        assert_eq!(ids, vec!["exam", "exam-head", "exam-head-side", "exam-neck"]);
        let resolved = &concepts[&ConceptId::from("exam")];
        assert_eq!(
            resolved.slot(SlotKind::Concepts),
            Some(&Slot::ReferenceList(vec!["exam-head".into(), "exam-neck".into()]))
        );
        assert_eq!(resolved.label.as_deref(), Some("Exam"));
        assert!(concepts.values().all(ConceptDefinition::is_reference_form));
        assert_eq!(sink.of_kind(DecisionKind::Inline).len(), 3);
    }

    #[test]
    fn mixed_lists_keep_their_order() {
        let catalog = ConceptCatalog::new();
        let exam = parse(
            "exam",
            json!({"type": "block", "data": ["first", {"second": {"type": "value"}}, "third"]}),
        );
        let concepts = promote(&exam, &"exam".into(), &catalog, &NullSink).unwrap();
        assert_eq!(
            concepts[&ConceptId::from("exam")].slot(SlotKind::Data),
            Some(&Slot::ReferenceList(vec![
                "first".into(),
                "second".into(),
                "third".into()
            ]))
        );
        assert_eq!(concepts[&ConceptId::from("second")].kind, ConceptType::Value);
    }

    #[test]
    fn inline_template_children_are_expanded() {
        let catalog = ConceptCatalog::from_value(&json!({
            "pain": {"type": "symptom", "values": {"pain-location": {"type": "value-set"}}}
        }))
        .unwrap();
        let visit = parse(
            "visit",
            json!({"type": "block", "concepts": {"headache": {"type": "pain"}}}),
        );
        let concepts = promote(&visit, &"visit".into(), &catalog, &NullSink).unwrap();
        assert_eq!(
            concepts[&ConceptId::from("headache")].original,
            Some("pain".into())
        );
        assert!(concepts.contains_key("headache-location"));
    }

    #[test]
    fn duplicate_children_across_slots_are_rejected() {
        let catalog = ConceptCatalog::new();
        let exam = parse(
            "exam",
            json!({
                "type": "block",
                "values": {"dup": {"type": "value"}},
                "data": [{"dup": {"type": "value"}}]
            }),
        );
        let err = promote(&exam, &"exam".into(), &catalog, &NullSink).unwrap_err();
        assert_eq!(
            err,
            ConceptError::DuplicateConcept {
                id: "dup".into(),
                first: "exam.values".to_string(),
                second: "exam.data".to_string(),
            }
        );
    }

    #[test]
    fn children_cannot_reuse_the_parent_id() {
        let catalog = ConceptCatalog::new();
        let exam = parse("exam", json!({"type": "block", "values": {"exam": {"type": "value"}}}));
        let err = promote(&exam, &"exam".into(), &catalog, &NullSink).unwrap_err();
        assert!(matches!(err, ConceptError::DuplicateConcept { .. }));
    }

    #[test]
    fn reference_only_definitions_are_unchanged() {
        let catalog = ConceptCatalog::new();
        let exam = parse("exam", json!({"type": "block", "values": ["a", "b"], "multiple": false}));
        let concepts = promote(&exam, &"exam".into(), &catalog, &NullSink).unwrap();
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[&ConceptId::from("exam")], exam);
    }
}
