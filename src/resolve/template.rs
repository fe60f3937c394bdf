//! Template Expander.
//!
//! A concept whose `type` names another concept is resolved by deep-cloning
//! that target under the concept's own id. Every id string in the cloned
//! subtree is passed through one rewrite rule: an explicit `types` override
//! first, then the literal prefix rewrite `target -> id`. Rewritten references
//! to concepts that are not authored are cloned in turn and placed inline, so
//! that promotion extracts them; authored ones stay plain references.
//! `type`, `label`, `multiple`, `path` and `value-set` are never substituted.

use super::{Resolution, Resolved, Resolver};
use crate::catalog::{
    ConceptCatalog, ConceptDefinition, ConceptId, InlineConcept, Slot, SlotEntry,
};
use crate::diagnostics::{DecisionKind, Diagnostic, DiagnosticSink};
use crate::error::{ConceptError, ConceptResult};
use serde_json::Value;
use std::collections::BTreeMap;

impl Resolution<'_> {
    /// Expand a template concept.
    ///
    /// `definition.type` must name a catalog concept or an alias stub;
    /// anything else is a `MissingDefinition` for the type.
    pub fn expand(
        &self,
        definition: &ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<BTreeMap<ConceptId, ConceptDefinition>> {
        let mut resolver = self.resolver()?;
        let target = resolver
            .lookup
            .template_target(definition)
            .ok_or_else(|| ConceptError::MissingDefinition {
                id: ConceptId::from(definition.kind.as_str()),
                parent: id.clone(),
            })?;
        Ok(resolver.expand(definition, id, &target)?.into_concepts(id))
    }
}

/// Expand one template concept against `catalog`.
pub fn expand(
    definition: &ConceptDefinition,
    id: &ConceptId,
    catalog: &ConceptCatalog,
    sink: &dyn DiagnosticSink,
) -> ConceptResult<BTreeMap<ConceptId, ConceptDefinition>> {
    Resolution::prepare(catalog, sink)?.expand(definition, id)
}

/// Rewrite rule for one expansion of `target` into `owner`.
struct Substitution<'s> {
    owner: &'s ConceptId,
    target: &'s ConceptId,
    overrides: &'s BTreeMap<ConceptId, ConceptId>,
}

struct Rewrite {
    id: ConceptId,
    kind: DecisionKind,
}

/// Rewritten id -> the id it was cloned from.
type Emitted = BTreeMap<ConceptId, ConceptId>;

/// Whether `rewrite` was already materialised from `source_id`.
fn already_emitted(
    emitted: &Emitted,
    rewrite: &Rewrite,
    source_id: &ConceptId,
    substitution: &Substitution<'_>,
) -> ConceptResult<bool> {
    match emitted.get(&rewrite.id) {
        None => Ok(false),
        Some(first) if first == source_id => Ok(true),
        Some(first) => Err(ConceptError::DuplicateConcept {
            id: rewrite.id.clone(),
            first: format!("{} from {first}", substitution.owner),
            second: format!("{} from {source_id}", substitution.owner),
        }),
    }
}

impl Substitution<'_> {
    fn rewrite(&self, value: &str) -> Option<Rewrite> {
        if let Some(renamed) = self.overrides.get(value) {
            return Some(Rewrite {
                id: renamed.clone(),
                kind: DecisionKind::Override,
            });
        }
        ConceptId::from(value)
            .rewrite_prefix(self.target.as_str(), self.owner.as_str())
            .map(|id| Rewrite {
                id,
                kind: DecisionKind::Alias,
            })
    }

    fn apply(&self, value: &ConceptId) -> ConceptId {
        self.rewrite(value.as_str())
            .map_or_else(|| value.clone(), |rewrite| rewrite.id)
    }
}

impl<'a> Resolver<'a> {
    pub(crate) fn expand(
        &mut self,
        definition: &ConceptDefinition,
        id: &ConceptId,
        target_id: &ConceptId,
    ) -> ConceptResult<Resolved> {
        if self.expanding.contains(target_id) {
            let mut chain = self.expanding.clone();
            chain.push(target_id.clone());
            return Err(ConceptError::Cycle { chain });
        }
        let target = self
            .lookup
            .get(target_id.as_str())
            .ok_or_else(|| ConceptError::MissingDefinition {
                id: target_id.clone(),
                parent: id.clone(),
            })?;

        self.expanding.push(target_id.clone());
        let expanded = self.expand_from(definition, id, target_id, target);
        self.expanding.pop();
        expanded
    }

    fn expand_from(
        &mut self,
        definition: &ConceptDefinition,
        id: &ConceptId,
        target_id: &ConceptId,
        target: &'a ConceptDefinition,
    ) -> ConceptResult<Resolved> {
        self.sink.record(Diagnostic::new(
            DecisionKind::Template,
            id,
            format!("{id} -> {target_id} ({})", target.kind),
        ));

        let substitution = Substitution {
            owner: id,
            target: target_id,
            overrides: &definition.types,
        };
        let mut emitted = BTreeMap::from([(id.clone(), target_id.clone())]);
        let mut clone = self.clone_definition(target, &substitution, id, &mut emitted)?;

        let mut types: BTreeMap<ConceptId, ConceptId> = target
            .types
            .iter()
            .map(|(from, to)| (from.clone(), substitution.apply(to)))
            .collect();
        types.extend(
            definition
                .types
                .iter()
                .map(|(from, to)| (from.clone(), to.clone())),
        );
        clone.types = types;
        clone.original = definition
            .original
            .clone()
            .or_else(|| Some(target_id.clone()));
        self.overlay(definition, id, target_id, &mut clone);

        match self.lookup.template_target(&clone) {
            Some(next) => self.expand(&clone, id, &next),
            None => {
                clone.types.clear();
                self.promote(clone, id)
            }
        }
    }

    /// Authored attributes of the template concept win over the clone.
    fn overlay(
        &self,
        definition: &ConceptDefinition,
        id: &ConceptId,
        target_id: &ConceptId,
        clone: &mut ConceptDefinition,
    ) {
        if let Some(label) = &definition.label {
            clone.label = Some(label.clone());
        }
        if definition.multiple.is_some() {
            clone.multiple = definition.multiple;
        }
        if let Some(path) = &definition.path {
            clone.path = Some(path.clone());
        }
        if let Some(value_set) = &definition.value_set {
            clone.value_set = Some(value_set.clone());
        }
        if let Some(condition) = &definition.enable_condition {
            clone.enable_condition = Some(condition.clone());
        }
        for (key, value) in &definition.extra {
            clone.extra.insert(key.clone(), value.clone());
        }
        for kind in definition.slots.keys() {
            self.sink.record(Diagnostic::new(
                DecisionKind::Ignored,
                id,
                format!("{id}.{kind} is ignored: {id} is expanded from {target_id}"),
            ));
        }
    }

    /// Deep-clone `source` for `owner`, rewriting ids in slots and conditions.
    ///
    /// `emitted` maps every id already materialised by this expansion to the
    /// id it was cloned from. A rewritten id is declared once and referenced
    /// afterwards; reaching it again from a different source is a duplicate.
    fn clone_definition(
        &self,
        source: &ConceptDefinition,
        substitution: &Substitution<'_>,
        owner: &ConceptId,
        emitted: &mut Emitted,
    ) -> ConceptResult<ConceptDefinition> {
        let mut clone = ConceptDefinition::new(source.kind.clone());
        clone.types = source.types.clone();
        clone.label = source.label.clone();
        clone.multiple = source.multiple;
        clone.path = source.path.clone();
        clone.original = source.original.clone();
        clone.extra = source.extra.clone();

        if let Some(value_set) = &source.value_set {
            self.sink.record(Diagnostic::new(
                DecisionKind::ValueSet,
                owner,
                format!("{owner}.value-set -> {value_set} (kept)"),
            ));
            clone.value_set = Some(value_set.clone());
        }
        clone.enable_condition = source
            .enable_condition
            .as_ref()
            .map(|condition| self.rewrite_condition(condition, substitution, owner));

        for (kind, slot) in &source.slots {
            let cloned = self.clone_slot(slot, substitution, owner, emitted)?;
            clone.slots.insert(*kind, cloned);
        }
        Ok(clone)
    }

    fn clone_slot(
        &self,
        slot: &Slot,
        substitution: &Substitution<'_>,
        owner: &ConceptId,
        emitted: &mut Emitted,
    ) -> ConceptResult<Slot> {
        let (entries, single) = match slot {
            Slot::Literal(value) => return Ok(Slot::Literal(value.clone())),
            Slot::Reference(id) => (
                vec![self.clone_reference(id, substitution, owner, emitted)?],
                true,
            ),
            Slot::ReferenceList(ids) => {
                let mut entries = Vec::with_capacity(ids.len());
                for id in ids {
                    entries.push(self.clone_reference(id, substitution, owner, emitted)?);
                }
                (entries, false)
            }
            Slot::Inline(children) => {
                let mut entries = Vec::with_capacity(children.len());
                for child in children {
                    entries.push(self.clone_inline(child, substitution, owner, emitted)?);
                }
                (entries, true)
            }
            Slot::List(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    entries.push(match item {
                        SlotEntry::Reference(id) => {
                            self.clone_reference(id, substitution, owner, emitted)?
                        }
                        SlotEntry::Inline(child) => {
                            self.clone_inline(child, substitution, owner, emitted)?
                        }
                    });
                }
                (entries, false)
            }
        };
        Ok(Slot::from_entries(entries, single))
    }

    fn clone_reference(
        &self,
        id: &ConceptId,
        substitution: &Substitution<'_>,
        owner: &ConceptId,
        emitted: &mut Emitted,
    ) -> ConceptResult<SlotEntry> {
        let Some(rewrite) = substitution.rewrite(id.as_str()) else {
            return Ok(SlotEntry::Reference(id.clone()));
        };
        if self.lookup.is_authored(rewrite.id.as_str()) {
            self.record_existing(owner, id, &rewrite.id);
            return Ok(SlotEntry::Reference(rewrite.id));
        }
        if already_emitted(emitted, &rewrite, id, substitution)? {
            return Ok(SlotEntry::Reference(rewrite.id));
        }
        let source = self
            .lookup
            .get(id.as_str())
            .ok_or_else(|| ConceptError::MissingDefinition {
                id: id.clone(),
                parent: owner.clone(),
            })?;
        let definition = self.clone_child(source, id, &rewrite, substitution, emitted)?;
        Ok(SlotEntry::Inline(InlineConcept {
            id: rewrite.id,
            definition,
        }))
    }

    fn clone_inline(
        &self,
        child: &InlineConcept,
        substitution: &Substitution<'_>,
        owner: &ConceptId,
        emitted: &mut Emitted,
    ) -> ConceptResult<SlotEntry> {
        let Some(rewrite) = substitution.rewrite(child.id.as_str()) else {
            // Promoted by the target's own resolution; share it.
            return Ok(SlotEntry::Reference(child.id.clone()));
        };
        if self.lookup.is_authored(rewrite.id.as_str()) {
            self.record_existing(owner, &child.id, &rewrite.id);
            return Ok(SlotEntry::Reference(rewrite.id));
        }
        if already_emitted(emitted, &rewrite, &child.id, substitution)? {
            return Ok(SlotEntry::Reference(rewrite.id));
        }
        let definition =
            self.clone_child(&child.definition, &child.id, &rewrite, substitution, emitted)?;
        Ok(SlotEntry::Inline(InlineConcept {
            id: rewrite.id,
            definition,
        }))
    }

    fn clone_child(
        &self,
        source: &ConceptDefinition,
        source_id: &ConceptId,
        rewrite: &Rewrite,
        substitution: &Substitution<'_>,
        emitted: &mut Emitted,
    ) -> ConceptResult<ConceptDefinition> {
        self.sink.record(Diagnostic::new(
            rewrite.kind,
            &rewrite.id,
            format!("{source_id} -> {} ({})", rewrite.id, source.kind),
        ));
        emitted.insert(rewrite.id.clone(), source_id.clone());
        let mut definition = self.clone_definition(source, substitution, &rewrite.id, emitted)?;
        definition.original = Some(source_id.clone());
        Ok(definition)
    }

    fn rewrite_condition(
        &self,
        condition: &Value,
        substitution: &Substitution<'_>,
        owner: &ConceptId,
    ) -> Value {
        match condition {
            Value::String(text) => match substitution.rewrite(text) {
                Some(rewrite) => {
                    self.sink.record(Diagnostic::new(
                        DecisionKind::Condition,
                        owner,
                        format!("{owner}.enable-condition.{text} -> {}", rewrite.id),
                    ));
                    Value::String(rewrite.id.0)
                }
                None => condition.clone(),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.rewrite_condition(item, substitution, owner))
                    .collect(),
            ),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| {
                        (key.clone(), self.rewrite_condition(value, substitution, owner))
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn record_existing(&self, owner: &ConceptId, from: &ConceptId, to: &ConceptId) {
        self.sink.record(Diagnostic::new(
            DecisionKind::Existing,
            owner,
            format!("{from} -> {to} is authored; keeping the reference"),
        ));
    }
}
