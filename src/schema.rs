//! JSON Schema for one concept catalog file.
//!
//! The schema ships inside the binary so validation never depends on the
//! working directory. Structural problems (wrong value shapes, authored
//! `original` keys) are caught here with their instance path, before the
//! typed parser sees the file.

use anyhow::{Context, Result, anyhow};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

const CATALOG_SCHEMA: &str = include_str!("../schema/concept_catalog.schema.json");

/// Compiled validator for concept catalog files.
pub struct CatalogSchema {
    compiled: JSONSchema,
}

impl CatalogSchema {
    pub fn load() -> Result<Self> {
        let raw: Value =
            serde_json::from_str(CATALOG_SCHEMA).context("parsing embedded concept schema")?;
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&raw)
            .map_err(|err| anyhow!("compiling embedded concept schema: {err}"))?;
        Ok(Self { compiled })
    }

    /// Validate one catalog file, returning every violation as
    /// `<instance path>: <message>`.
    pub fn validate(&self, document: &Value) -> Result<(), Vec<String>> {
        self.compiled.validate(document).map_err(|errors| {
            errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        format!("/: {err}")
                    } else {
                        format!("{path}: {err}")
                    }
                })
                .collect()
        })
    }

    pub fn is_valid(&self, document: &Value) -> bool {
        self.compiled.is_valid(document)
    }
}
