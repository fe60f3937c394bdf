#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use concept_catalog::{ConceptCatalog, ConceptRegistry, NullSink, resolve_catalog};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn concepts_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_concepts"))
}

pub fn catalog(value: Value) -> ConceptCatalog {
    ConceptCatalog::from_value(&value).expect("fixture catalog should parse")
}

pub fn resolve(value: Value) -> Result<ConceptRegistry> {
    Ok(resolve_catalog(&catalog(value), &NullSink)?)
}

/// Writes `documents` as YAML files into a fresh temporary catalog directory.
pub fn write_catalog(documents: &[(&str, Value)]) -> Result<TempDir> {
    let dir = TempDir::new().context("failed to allocate catalog dir")?;
    for (name, document) in documents {
        write_yaml(&dir.path().join(name), document)?;
    }
    Ok(dir)
}

pub fn write_yaml(path: &Path, document: &Value) -> Result<()> {
    let body = serde_yaml::to_string(document).context("serializing fixture")?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

/// A `concepts` invocation with inherited configuration cleared.
pub fn concepts_command(root: &Path) -> Command {
    let mut cmd = Command::new(concepts_binary());
    cmd.arg("--concepts")
        .arg(root)
        .env_remove("CONCEPTS_ROOT")
        .env_remove("CONCEPTS_FORMAT")
        .env_remove("CONCEPTS_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

pub fn stdout_json(output: &Output) -> Result<Value> {
    serde_json::from_slice(&output.stdout).context("parsing command stdout as JSON")
}
