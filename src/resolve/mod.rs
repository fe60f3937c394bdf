//! Catalog resolution: template expansion, inline promotion and merging.
//!
//! [`resolve_catalog`] is the single entry point most callers need. It runs
//! the alias resolver once, resolves every catalog entry against the read-only
//! catalog plus the derived stubs, and merges the results into a flat
//! [`ConceptRegistry`]. Resolution never mutates its input and never returns
//! a partial registry.

pub mod alias;
pub mod inline;
pub mod merge;
pub mod template;

use crate::catalog::{ConceptCatalog, ConceptDefinition, ConceptId, ConceptRegistry};
use crate::diagnostics::DiagnosticSink;
use crate::error::{ConceptError, ConceptResult};
use std::collections::BTreeMap;

pub use alias::{derive_stubs, AliasPlan, RootAlias};
pub use merge::{merge, ConceptMerger, Contribution};

/// A catalog prepared for resolution, with its alias stubs already derived.
///
/// Holds only shared references, so one `Resolution` can serve concurrent
/// per-concept calls.
pub struct Resolution<'a> {
    catalog: &'a ConceptCatalog,
    plan: AliasPlan,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Resolution<'a> {
    /// Run the alias resolver over `catalog`.
    pub fn prepare(catalog: &'a ConceptCatalog, sink: &'a dyn DiagnosticSink) -> ConceptResult<Self> {
        let plan = derive_stubs(catalog, sink)?;
        Ok(Self {
            catalog,
            plan,
            sink,
        })
    }

    pub fn plan(&self) -> &AliasPlan {
        &self.plan
    }

    /// Resolve one definition to `id` plus every concept it pulls in.
    pub fn resolve_concept(
        &self,
        definition: &ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<BTreeMap<ConceptId, ConceptDefinition>> {
        Ok(self.resolver()?.resolve(definition, id)?.into_concepts(id))
    }

    /// Resolve every catalog entry and merge the results.
    ///
    /// A stub is left out of its root's alias fragment only when expanding
    /// that root already produced the id from the same source. Any other
    /// collision reaches the merger and fails.
    pub fn finish(self) -> ConceptResult<ConceptRegistry> {
        let mut resolver = self.resolver()?;
        let mut resolved = Vec::with_capacity(self.catalog.len());
        let mut extracted = BTreeMap::new();
        for (id, definition) in self.catalog.iter() {
            let outcome = resolver.resolve(definition, id)?;
            resolved.push((id.clone(), outcome.definition));
            extracted.insert(id, outcome.extracted);
        }

        let aliases: Vec<_> = self
            .plan
            .fragments()
            .map(|(root, fragment)| {
                let expanded = extracted.get(root);
                let pending: Vec<_> = fragment
                    .iter()
                    .filter(|(id, stub)| !self.materialised(expanded, id, stub))
                    .map(|(id, stub)| (id.clone(), stub.clone()))
                    .collect();
                (format!("{root} (alias)"), pending)
            })
            .collect();

        let mut merger = ConceptMerger::new();
        merger.add("catalog", resolved)?;
        for (id, concepts) in extracted {
            merger.add(&format!("{id} (extracted)"), concepts)?;
        }
        for (source, pending) in aliases {
            merger.add(&source, pending)?;
        }

        let registry = merger.finish();
        tracing::debug!(
            authored = self.catalog.len(),
            resolved = registry.len(),
            "resolved concept catalog"
        );
        Ok(registry)
    }

    fn resolver(&self) -> ConceptResult<Resolver<'_>> {
        Ok(Resolver {
            lookup: Lookup::new(self.catalog, &self.plan)?,
            sink: self.sink,
            expanding: Vec::new(),
        })
    }

    /// Whether `expanded` already holds `id`, cloned from the stub's source.
    fn materialised(
        &self,
        expanded: Option<&BTreeMap<ConceptId, ConceptDefinition>>,
        id: &ConceptId,
        stub: &ConceptDefinition,
    ) -> bool {
        let Some(concept) = expanded.and_then(|concepts| concepts.get(id)) else {
            return false;
        };
        match (&concept.original, &stub.original) {
            (Some(cloned), Some(derived)) => {
                self.plan.source_of(cloned) == self.plan.source_of(derived)
            }
            _ => false,
        }
    }
}

/// Resolve a raw catalog into a flat registry in reference form.
pub fn resolve_catalog(
    catalog: &ConceptCatalog,
    sink: &dyn DiagnosticSink,
) -> ConceptResult<ConceptRegistry> {
    Resolution::prepare(catalog, sink)?.finish()
}

/// Outcome of resolving one concept.
#[derive(Debug)]
pub(crate) struct Resolved {
    /// The concept itself, in reference form.
    pub(crate) definition: ConceptDefinition,
    /// Every other concept its resolution produced.
    pub(crate) extracted: BTreeMap<ConceptId, ConceptDefinition>,
}

impl Resolved {
    pub(crate) fn into_concepts(self, id: &ConceptId) -> BTreeMap<ConceptId, ConceptDefinition> {
        let mut concepts = self.extracted;
        concepts.insert(id.clone(), self.definition);
        concepts
    }
}

/// Authored catalog entries plus alias stubs.
pub(crate) struct Lookup<'a> {
    catalog: &'a ConceptCatalog,
    stubs: BTreeMap<&'a str, &'a ConceptDefinition>,
}

impl<'a> Lookup<'a> {
    fn new(catalog: &'a ConceptCatalog, plan: &'a AliasPlan) -> ConceptResult<Self> {
        let stubs = plan
            .stubs()?
            .into_iter()
            .map(|(id, stub)| (id.as_str(), stub))
            .collect();
        Ok(Self { catalog, stubs })
    }

    pub(crate) fn get(&self, id: &str) -> Option<&'a ConceptDefinition> {
        self.catalog
            .get(id)
            .or_else(|| self.stubs.get(id).copied())
    }

    pub(crate) fn is_authored(&self, id: &str) -> bool {
        self.catalog.contains(id)
    }

    /// Concept named by `definition.type`, when that type is a template.
    pub(crate) fn template_target(&self, definition: &ConceptDefinition) -> Option<ConceptId> {
        let tag = definition.kind.as_str();
        self.get(tag).map(|_| ConceptId::from(tag))
    }
}

/// Per-call resolution state: the lookup and the template chain in progress.
pub(crate) struct Resolver<'a> {
    pub(crate) lookup: Lookup<'a>,
    pub(crate) sink: &'a dyn DiagnosticSink,
    pub(crate) expanding: Vec<ConceptId>,
}

impl Resolver<'_> {
    pub(crate) fn resolve(
        &mut self,
        definition: &ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<Resolved> {
        match self.dispatch(definition, id)? {
            Some(target) => self.expand(definition, id, &target),
            None => self.promote(definition.clone(), id),
        }
    }

    pub(crate) fn resolve_owned(
        &mut self,
        definition: ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<Resolved> {
        match self.dispatch(&definition, id)? {
            Some(target) => self.expand(&definition, id, &target),
            None => self.promote(definition, id),
        }
    }

    fn dispatch(
        &self,
        definition: &ConceptDefinition,
        id: &ConceptId,
    ) -> ConceptResult<Option<ConceptId>> {
        if definition.kind.as_str().trim().is_empty() {
            return Err(ConceptError::MissingType { id: id.clone() });
        }
        Ok(self.lookup.template_target(definition))
    }
}
