//! Alias Resolver: derives stub definitions for template children.
//!
//! Runs once over a read-only catalog before any expansion. For every
//! template root `R` (a concept whose type names another catalog entry `T`)
//! it records the root alias and a stub `{type, original}` for each child id
//! `R` implicitly owns: either renamed through `R.types` or obtained by
//! rewriting the `T` prefix of a catalog id to `R`. When `T` is itself a
//! template root, its stubs are derived first and also act as sources, so
//! chains of templates resolve transitively without touching the catalog.

use crate::catalog::{ConceptCatalog, ConceptDefinition, ConceptId, ConceptType};
use crate::diagnostics::{DecisionKind, Diagnostic, DiagnosticSink};
use crate::error::{ConceptError, ConceptResult};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Template relationship of one root: what it is expanded from.
pub struct RootAlias {
    pub target: ConceptId,
    #[serde(rename = "type")]
    pub kind: ConceptType,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AliasPlan {
    roots: BTreeMap<ConceptId, RootAlias>,
    #[serde(rename = "stubs")]
    fragments: BTreeMap<ConceptId, BTreeMap<ConceptId, ConceptDefinition>>,
}

impl AliasPlan {
    pub fn root(&self, id: &str) -> Option<&RootAlias> {
        self.roots.get(id)
    }

    pub fn roots(&self) -> impl Iterator<Item = (&ConceptId, &RootAlias)> {
        self.roots.iter()
    }

    /// Stubs derived for one template root.
    pub fn fragment(&self, root: &str) -> Option<&BTreeMap<ConceptId, ConceptDefinition>> {
        self.fragments.get(root)
    }

    pub fn fragments(
        &self,
    ) -> impl Iterator<Item = (&ConceptId, &BTreeMap<ConceptId, ConceptDefinition>)> {
        self.fragments.iter()
    }

    /// Every stub, keyed by derived id.
    ///
    /// Two roots deriving the same id is a `DuplicateConcept` naming both.
    pub fn stubs(&self) -> ConceptResult<BTreeMap<&ConceptId, &ConceptDefinition>> {
        let mut stubs = BTreeMap::new();
        let mut owners: BTreeMap<&ConceptId, &ConceptId> = BTreeMap::new();
        for (root, fragment) in &self.fragments {
            for (id, stub) in fragment {
                if let Some(first) = owners.insert(id, root) {
                    return Err(ConceptError::DuplicateConcept {
                        id: id.clone(),
                        first: format!("{first} (alias)"),
                        second: format!("{root} (alias)"),
                    });
                }
                stubs.insert(id, stub);
            }
        }
        Ok(stubs)
    }

    /// Authored concept `id` derives from, following stub originals.
    ///
    /// Ids that are not stubs are their own source.
    pub fn source_of<'p>(&'p self, id: &'p ConceptId) -> &'p ConceptId {
        let mut current = id;
        for _ in 0..=self.stub_count() {
            let original = self
                .fragments
                .values()
                .find_map(|fragment| fragment.get(current))
                .and_then(|stub| stub.original.as_ref());
            match original {
                Some(original) => current = original,
                None => break,
            }
        }
        current
    }

    pub fn stub_count(&self) -> usize {
        self.fragments.values().map(BTreeMap::len).sum()
    }
}

/// Derive the alias plan of `catalog`.
///
/// Fails with `Cycle` when a chain of template roots loops back on itself,
/// and with `DuplicateConcept` when two sources derive the same stub id.
pub fn derive_stubs(catalog: &ConceptCatalog, sink: &dyn DiagnosticSink) -> ConceptResult<AliasPlan> {
    let mut deriver = StubDeriver {
        catalog,
        sink,
        plan: AliasPlan::default(),
        visiting: Vec::new(),
    };
    for (id, definition) in catalog.iter() {
        if catalog.contains(definition.kind.as_str()) {
            deriver.derive(id)?;
        }
    }
    deriver.plan.stubs()?;
    Ok(deriver.plan)
}

struct StubDeriver<'a> {
    catalog: &'a ConceptCatalog,
    sink: &'a dyn DiagnosticSink,
    plan: AliasPlan,
    visiting: Vec<ConceptId>,
}

impl StubDeriver<'_> {
    fn derive(&mut self, root_id: &ConceptId) -> ConceptResult<()> {
        if self.plan.fragments.contains_key(root_id) {
            return Ok(());
        }
        if self.visiting.contains(root_id) {
            let mut chain = self.visiting.clone();
            chain.push(root_id.clone());
            return Err(ConceptError::Cycle { chain });
        }

        let catalog = self.catalog;
        let Some(root) = catalog.get(root_id.as_str()) else {
            return Ok(());
        };
        let target_id = ConceptId::from(root.kind.as_str());
        let Some(target) = catalog.get(target_id.as_str()) else {
            return Ok(());
        };

        let inherited = if catalog.contains(target.kind.as_str()) {
            self.visiting.push(root_id.clone());
            let derived = self.derive(&target_id);
            self.visiting.pop();
            derived?;
            self.plan
                .fragments
                .get(&target_id)
                .cloned()
                .unwrap_or_default()
        } else {
            BTreeMap::new()
        };

        self.sink.record(Diagnostic::new(
            DecisionKind::Alias,
            root_id,
            format!("{root_id} -> {target_id} ({})", target.kind),
        ));
        self.plan.roots.insert(
            root_id.clone(),
            RootAlias {
                target: target_id.clone(),
                kind: target.kind.clone(),
            },
        );

        let sources = catalog
            .iter()
            .map(|(id, definition)| (id, &definition.kind))
            .chain(inherited.iter().map(|(id, stub)| (id, &stub.kind)));

        let mut fragment = BTreeMap::new();
        for (id, kind) in sources {
            if id == root_id || *id == target_id {
                continue;
            }
            let derived = match root.types.get(id) {
                Some(child) => Some((child.clone(), DecisionKind::Override)),
                None => id
                    .rewrite_prefix(target_id.as_str(), root_id.as_str())
                    .map(|child| (child, DecisionKind::Alias)),
            };
            let Some((child, decision)) = derived else {
                continue;
            };
            if catalog.contains(child.as_str()) {
                self.sink.record(Diagnostic::new(
                    DecisionKind::Existing,
                    &child,
                    format!("{id} -> {child} ({kind}) already exists"),
                ));
                continue;
            }
            if let Some(first) = fragment.get(&child) {
                return Err(ConceptError::DuplicateConcept {
                    first: alias_source(root_id, first),
                    second: format!("{root_id} (alias of {id})"),
                    id: child,
                });
            }
            self.sink.record(Diagnostic::new(
                decision,
                &child,
                format!("{id} -> {child} ({kind})"),
            ));
            fragment.insert(child, ConceptDefinition::stub(kind.clone(), id.clone()));
        }

        self.plan.fragments.insert(root_id.clone(), fragment);
        Ok(())
    }
}

fn alias_source(root: &ConceptId, stub: &ConceptDefinition) -> String {
    match &stub.original {
        Some(original) => format!("{root} (alias of {original})"),
        None => format!("{root} (alias)"),
    }
}
