//! Concept catalog wiring.
//!
//! Concept definitions are authored as YAML mappings under a catalog
//! directory. This module owns the typed model those files parse into, the
//! id-keyed `ConceptCatalog`/`ConceptRegistry` views, and the directory
//! loader. Resolution lives in [`crate::resolve`].

pub mod identity;
pub mod index;
pub mod loader;
pub mod model;

pub use identity::{ConceptId, ConceptType, SlotKind};
pub use index::{ConceptCatalog, ConceptRegistry};
pub use loader::{catalog_files, load_catalog_dir, load_catalog_file};
pub use model::{ConceptDefinition, ConceptPath, InlineConcept, Slot, SlotEntry};
