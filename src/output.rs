//! Rendering and writing command results.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => bail!("unknown output format '{other}' (expected json or yaml)"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render `value` as pretty JSON or YAML, always ending with a newline.
pub fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<String> {
    let mut rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).context("rendering JSON")?,
        OutputFormat::Yaml => serde_yaml::to_string(value).context("rendering YAML")?,
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

/// Write rendered output to `destination`, or stdout when absent.
///
/// Files are replaced atomically: the content goes to a temporary file in the
/// destination directory which is then persisted over the target.
pub fn write_output(destination: Option<&Path>, contents: &str) -> Result<()> {
    let Some(path) = destination else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(contents.as_bytes())
            .context("writing to stdout")?;
        return handle.flush().context("flushing stdout");
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temporary file in {}", parent.display()))?;
    staged
        .write_all(contents.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    staged
        .persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn render_keeps_key_order() {
        let value = json!({"type": "symptom", "original": "pain", "values": ["a"]});
        let rendered = render(&value, OutputFormat::Json).unwrap();
        let type_at = rendered.find("\"type\"").unwrap();
        let original_at = rendered.find("\"original\"").unwrap();
        assert!(type_at < original_at);
        assert!(rendered.ends_with('\n'));

        let yaml = render(&value, OutputFormat::Yaml).unwrap();
        assert!(yaml.starts_with("type: symptom\noriginal: pain\n"), "{yaml}");
    }

    #[test]
    fn write_output_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "stale").unwrap();
        write_output(Some(&path), "{}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
