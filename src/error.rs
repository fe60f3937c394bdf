//! Failure taxonomy of concept resolution.
//!
//! Every variant is fatal: a partially resolved registry would corrupt the
//! id-keyed lookups downstream, so callers never receive one.

use crate::catalog::ConceptId;
use thiserror::Error;

pub type ConceptResult<T> = Result<T, ConceptError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConceptError {
    #[error("missing type info for concept '{id}'")]
    MissingType { id: ConceptId },

    #[error("missing concept definition '{id}' (required by '{parent}')")]
    MissingDefinition { id: ConceptId, parent: ConceptId },

    #[error("concept '{id}' is duplicated: defined by {first} and by {second}")]
    DuplicateConcept {
        id: ConceptId,
        first: String,
        second: String,
    },

    #[error("template cycle detected: {}", format_chain(.chain))]
    Cycle { chain: Vec<ConceptId> },

    #[error("invalid definition for concept '{id}': {reason}")]
    InvalidDefinition { id: ConceptId, reason: String },
}

impl ConceptError {
    pub(crate) fn invalid(id: &ConceptId, reason: impl Into<String>) -> Self {
        ConceptError::InvalidDefinition {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

fn format_chain(chain: &[ConceptId]) -> String {
    chain
        .iter()
        .map(ConceptId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
