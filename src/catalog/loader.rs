//! Reads concept catalogs from YAML files.
//!
//! A catalog directory holds any number of `*.yml`/`*.yaml` files, each a
//! mapping of concept id to definition. Files are read in file-name order,
//! validated against the embedded schema, and merged; an id may be declared
//! in only one file.

use crate::catalog::identity::ConceptId;
use crate::catalog::index::ConceptCatalog;
use crate::catalog::model::ConceptDefinition;
use crate::error::ConceptError;
use crate::schema::CatalogSchema;
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Load every catalog file directly inside `root`.
pub fn load_catalog_dir(root: &Path) -> Result<ConceptCatalog> {
    let files = catalog_files(root)?;
    let schema = CatalogSchema::load()?;

    let mut entries: BTreeMap<ConceptId, ConceptDefinition> = BTreeMap::new();
    let mut owners: BTreeMap<ConceptId, PathBuf> = BTreeMap::new();
    for path in &files {
        for (id, definition) in read_file(path, &schema)? {
            if let Some(first) = owners.get(&id) {
                return Err(ConceptError::DuplicateConcept {
                    id,
                    first: first.display().to_string(),
                    second: path.display().to_string(),
                }
                .into());
            }
            owners.insert(id.clone(), path.clone());
            entries.insert(id, definition);
        }
    }

    tracing::info!(
        root = %root.display(),
        files = files.len(),
        concepts = entries.len(),
        "loaded concept catalog"
    );
    Ok(entries.into_iter().collect())
}

/// Load a single catalog file.
pub fn load_catalog_file(path: &Path) -> Result<ConceptCatalog> {
    let schema = CatalogSchema::load()?;
    let entries = read_file(path, &schema)?;
    tracing::info!(path = %path.display(), concepts = entries.len(), "loaded concept file");
    Ok(entries.into_iter().collect())
}

/// YAML files directly inside `root`, sorted by file name.
pub fn catalog_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("concept directory {} does not exist", root.display());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("reading {}", root.display()))? {
        let path = entry
            .with_context(|| format!("reading {}", root.display()))?
            .path();
        if path.is_file() && is_yaml(&path) {
            files.push(path);
        } else {
            tracing::trace!(path = %path.display(), "skipping non-catalog entry");
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml" | "yaml")
    )
}

fn read_file(path: &Path, schema: &CatalogSchema) -> Result<Vec<(ConceptId, ConceptDefinition)>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if text.trim().is_empty() {
        tracing::debug!(path = %path.display(), "empty concept file");
        return Ok(Vec::new());
    }
    let document: Value =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if document.is_null() {
        return Ok(Vec::new());
    }
    if let Err(errors) = schema.validate(&document) {
        bail!(
            "{} does not match the concept schema:\n{}",
            path.display(),
            errors.join("\n")
        );
    }

    let Value::Object(fields) = document else {
        bail!("{} must hold a mapping of concept ids", path.display());
    };
    fields
        .into_iter()
        .map(|(key, value)| {
            let id = ConceptId::from(key);
            let definition = ConceptDefinition::from_value(&id, &value)
                .with_context(|| format!("parsing concept '{id}' in {}", path.display()))?;
            Ok((id, definition))
        })
        .collect()
}
