//! Resolves a concept catalog and prints the result.
//!
//! `concepts resolve` prints the flat registry, `rows` the spreadsheet
//! projection (or, with `--existing`, the changes needed to sync existing
//! rows), `labels` the label policy of every concept, `aliases` the derived
//! alias plan, and `check` only validates and reports counts.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use concept_catalog::{
    CollectingSink, ConceptCatalog, ConceptRow, OutputFormat, Resolution, TeeSink, TracingSink,
    concept_rows, label_policies, load_catalog_dir, load_catalog_file, render,
    resolve_catalog, sync_rows, write_output,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "concepts")]
#[command(about = "Resolve concept catalogs into a flat registry", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Catalog directory (or a single catalog file)
    #[arg(long, env = "CONCEPTS_ROOT", default_value = "concepts", global = true)]
    concepts: PathBuf,

    /// Output format: json or yaml
    #[arg(long, env = "CONCEPTS_FORMAT", default_value = "json", global = true)]
    format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(short, long, env = "CONCEPTS_OUTPUT", global = true)]
    output: Option<PathBuf>,

    /// Log every resolution decision
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved registry
    Resolve,

    /// Print spreadsheet rows for every resolved concept
    Rows {
        /// Existing rows (JSON or YAML list); prints the sync plan instead
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Print the label policy of every resolved concept
    Labels,

    /// Print template roots and the alias stubs derived for them
    Aliases,

    /// Resolve the catalog and report counts
    Check,
}

#[derive(Serialize)]
struct CheckReport {
    authored: usize,
    resolved: usize,
    templates: usize,
    alias_stubs: usize,
    decisions: BTreeMap<String, usize>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    let catalog = load(&cli.global.concepts)?;
    let format = cli.global.format;
    let rendered = match cli.command {
        Command::Resolve => render(&resolve_catalog(&catalog, &TracingSink)?, format)?,
        Command::Rows { existing } => {
            let registry = resolve_catalog(&catalog, &TracingSink)?;
            match existing {
                Some(path) => {
                    let rows = read_rows(&path)?;
                    let sync = sync_rows(&registry, &rows);
                    tracing::info!(
                        updated = sync.updated.len(),
                        cleared = sync.cleared.len(),
                        added = sync.added.len(),
                        conflicts = sync.conflicts.len(),
                        "computed sheet sync"
                    );
                    for id in &sync.conflicts {
                        tracing::warn!(concept = %id, "concept is listed in more than one worksheet");
                    }
                    render(&sync, format)?
                }
                None => render(&concept_rows(&registry), format)?,
            }
        }
        Command::Labels => {
            let registry = resolve_catalog(&catalog, &TracingSink)?;
            render(&label_policies(&registry), format)?
        }
        Command::Aliases => {
            let resolution = Resolution::prepare(&catalog, &TracingSink)?;
            render(resolution.plan(), format)?
        }
        Command::Check => render(&check(&catalog)?, format)?,
    };
    write_output(cli.global.output.as_deref(), &rendered)
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn load(path: &Path) -> Result<ConceptCatalog> {
    if path.is_file() {
        load_catalog_file(path)
    } else {
        load_catalog_dir(path)
    }
}

fn read_rows(path: &Path) -> Result<Vec<ConceptRow>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing rows in {}", path.display()))
}

fn check(catalog: &ConceptCatalog) -> Result<CheckReport> {
    let collected = CollectingSink::new();
    let sink = TeeSink::new(&collected, &TracingSink);
    let resolution = Resolution::prepare(catalog, &sink)?;
    let templates = resolution.plan().roots().count();
    let alias_stubs = resolution.plan().stub_count();
    let registry = resolution.finish()?;

    let mut decisions = BTreeMap::new();
    for event in collected.events() {
        *decisions.entry(event.kind.to_string()).or_insert(0) += 1;
    }
    tracing::info!(
        authored = catalog.len(),
        resolved = registry.len(),
        "catalog resolves cleanly"
    );
    Ok(CheckReport {
        authored: catalog.len(),
        resolved: registry.len(),
        templates,
        alias_stubs,
        decisions,
    })
}
