use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::docs::types::DocId;

/// Which external model capability a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Embed,
    Summarize,
    Answer,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Embed => "embed",
            CapabilityKind::Summarize => "summarize",
            CapabilityKind::Answer => "answer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{capability} call failed: {message}")]
pub struct CapabilityError {
    pub capability: CapabilityKind,
    pub message: String,
}

impl CapabilityError {
    pub fn new(capability: CapabilityKind, err: anyhow::Error) -> Self {
        Self {
            capability,
            message: format!("{:#}", err),
        }
    }
}

/// Failure confined to one document's task.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("task aborted: {0}")]
    Aborted(String),
    #[error("document has no text to summarize")]
    Empty,
    #[error("no answer found in summary")]
    NoAnswer,
}

/// A per-document error tagged with the document it came from.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub document_id: DocId,
    pub error: String,
}

impl DocumentFailure {
    pub fn new(document_id: &str, error: &dyn fmt::Display) -> Self {
        Self {
            document_id: document_id.to_string(),
            error: error.to_string(),
        }
    }
}

/// Pipeline-wide outcomes the caller has to tell apart.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every document was scored and none cleared the threshold.
    #[error("no relevant documents among {considered} considered")]
    NoRelevantDocuments { considered: usize },
    #[error("query embedding failed: {0}")]
    Capability(#[from] CapabilityError),
    /// Nothing was retained and some documents could not be scored at all.
    #[error(
        "no document passed the relevance filter and {} of {considered} could not be scored",
        failures.len()
    )]
    ScoringFailed {
        considered: usize,
        failures: Vec<DocumentFailure>,
    },
    /// `failures` also lists documents dropped while scoring.
    #[error(
        "answering failed for all {relevant} relevant document(s) ({} failure(s) in total)",
        failures.len()
    )]
    AnsweringFailed {
        relevant: usize,
        failures: Vec<DocumentFailure>,
    },
}

impl PipelineError {
    /// Per-document failures carried by the error, if any.
    pub fn failures(&self) -> &[DocumentFailure] {
        match self {
            PipelineError::ScoringFailed { failures, .. }
            | PipelineError::AnsweringFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}
