use std::sync::Arc;

use tracing::{debug, warn};

use crate::docs::types::{Chunk, Summary};
use crate::error::{CapabilityError, CapabilityKind, DocumentError};

use super::capability::{SummaryOptions, Summarizer};

/// Reduces a document's chunks to one summary, chunk by chunk.
pub struct SummarizerStage {
    summarizer: Arc<dyn Summarizer>,
    options: SummaryOptions,
}

impl SummarizerStage {
    pub fn new(summarizer: Arc<dyn Summarizer>, options: SummaryOptions) -> Self {
        Self {
            summarizer,
            options,
        }
    }

    /// Summarize each chunk in order and join the results with single spaces.
    ///
    /// A chunk whose summarization fails is skipped and recorded; the document only
    /// fails when no chunk could be summarized.
    pub async fn summarize(&self, chunks: &[Chunk]) -> Result<Summary, DocumentError> {
        let Some(first) = chunks.first() else {
            return Err(DocumentError::Empty);
        };
        let doc_id = first.source_document_id.clone();

        let mut parts = Vec::with_capacity(chunks.len());
        let mut skipped = Vec::new();
        let mut last_error = None;

        for chunk in chunks {
            match self.summarizer.summarize(&chunk.text, &self.options).await {
                Ok(part) => {
                    let part = part.trim().to_string();
                    if !part.is_empty() {
                        parts.push(part);
                    }
                }
                Err(e) => {
                    let err = CapabilityError::new(CapabilityKind::Summarize, e);
                    warn!(doc_id = %doc_id, chunk = chunk.ordinal, error = %err, "Chunk summary failed, skipping");
                    skipped.push(chunk.ordinal);
                    last_error = Some(err);
                }
            }
        }

        if skipped.len() == chunks.len() {
            if let Some(err) = last_error {
                return Err(DocumentError::Capability(err));
            }
        }

        debug!(
            doc_id = %doc_id,
            chunks = chunks.len(),
            skipped = skipped.len(),
            "document summarized"
        );

        Ok(Summary {
            source_document_id: doc_id,
            text: parts.join(" "),
            chunk_count: chunks.len(),
            skipped_chunks: skipped,
        })
    }
}
