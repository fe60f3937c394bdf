//! Structured advisory events emitted while resolving a catalog.
//!
//! The engine reports every resolution decision to an injected
//! [`DiagnosticSink`]. Events are informational only; nothing the sink does
//! can change the outcome of a resolution.

use crate::catalog::ConceptId;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    /// A nested definition was promoted to a standalone entry.
    Inline,
    /// A child id was derived by prefix rewriting.
    Alias,
    /// A child id came from an explicit `types` override.
    Override,
    /// A concept was expanded from a template.
    Template,
    /// An id inside an `enable-condition` was rewritten.
    Condition,
    /// A `value-set` reference was kept verbatim.
    ValueSet,
    /// A derived id already has an authored definition.
    Existing,
    /// Authored content was dropped.
    Ignored,
}

impl DecisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionKind::Inline => "inline",
            DecisionKind::Alias => "alias",
            DecisionKind::Override => "override",
            DecisionKind::Template => "template",
            DecisionKind::Condition => "condition",
            DecisionKind::ValueSet => "value-set",
            DecisionKind::Existing => "existing",
            DecisionKind::Ignored => "ignored",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DecisionKind,
    pub concept: ConceptId,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DecisionKind, concept: &ConceptId, detail: impl Into<String>) -> Self {
        Self {
            kind,
            concept: concept.clone(),
            detail: detail.into(),
        }
    }
}

/// Receiver for resolution decisions.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Forwards events to `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: Diagnostic) {
        tracing::debug!(
            kind = %diagnostic.kind,
            concept = %diagnostic.concept,
            "{}",
            diagnostic.detail
        );
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _diagnostic: Diagnostic) {}
}

/// Forwards every event to two sinks as it is recorded.
#[derive(Clone, Copy)]
pub struct TeeSink<'a> {
    first: &'a dyn DiagnosticSink,
    second: &'a dyn DiagnosticSink,
}

impl<'a> TeeSink<'a> {
    pub fn new(first: &'a dyn DiagnosticSink, second: &'a dyn DiagnosticSink) -> Self {
        Self { first, second }
    }
}

impl DiagnosticSink for TeeSink<'_> {
    fn record(&self, diagnostic: Diagnostic) {
        self.first.record(diagnostic.clone());
        self.second.record(diagnostic);
    }
}

/// Buffers events in memory; safe to share between threads.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn of_kind(&self, kind: DecisionKind) -> Vec<Diagnostic> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(diagnostic);
    }
}
