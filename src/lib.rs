//! Concept catalog resolution.
//!
//! A concept catalog declares data-entry concepts (symptoms, value sets,
//! blocks of questions) as YAML. Authors reuse structure in two ways: a
//! concept whose `type` names another concept is a template instance whose
//! subtree is cloned under new ids, and a concept may declare children inline
//! instead of at the top level. This crate loads such a catalog, expands
//! templates, derives alias ids, promotes inline children, and merges the
//! result into a flat registry in which every structural slot holds only id
//! references and every id is unique.
//!
//! The engine (`resolve`) is a pure function of its input catalog and an
//! injected diagnostics sink. File handling, schema validation and output
//! live beside it and are what the `concepts` binary wires together.

pub mod catalog;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod projection;
pub mod resolve;
pub mod schema;

pub use catalog::{
    ConceptCatalog, ConceptDefinition, ConceptId, ConceptPath, ConceptRegistry, ConceptType,
    InlineConcept, Slot, SlotEntry, SlotKind, load_catalog_dir, load_catalog_file,
};
pub use diagnostics::{
    CollectingSink, DecisionKind, Diagnostic, DiagnosticSink, NullSink, TeeSink, TracingSink,
};
pub use error::{ConceptError, ConceptResult};
pub use output::{OutputFormat, render, write_output};
pub use projection::{
    ConceptRow, LabelPolicy, LabelSource, SheetSync, Worksheet, concept_rows, label_policies,
    label_policy, sync_rows,
};
pub use resolve::{AliasPlan, Resolution, RootAlias, derive_stubs, merge, resolve_catalog};
pub use schema::CatalogSchema;
