use std::sync::Arc;

use crate::docs::types::{CandidateAnswer, Summary};
use crate::error::{CapabilityError, CapabilityKind, DocumentError};

use super::capability::QuestionAnswerer;

pub struct AnswerExtractor {
    reader: Arc<dyn QuestionAnswerer>,
}

impl AnswerExtractor {
    pub fn new(reader: Arc<dyn QuestionAnswerer>) -> Self {
        Self { reader }
    }

    /// Ask the QA model for one answer span from `summary`.
    pub async fn extract(
        &self,
        query: &str,
        summary: &Summary,
    ) -> Result<CandidateAnswer, DocumentError> {
        let extracted = self
            .reader
            .answer(query, &summary.text)
            .await
            .map_err(|e| CapabilityError::new(CapabilityKind::Answer, e))?;

        let text = extracted.text.trim().to_string();
        if text.is_empty() {
            return Err(DocumentError::NoAnswer);
        }

        let span = extracted.span.or_else(|| {
            summary
                .text
                .find(text.as_str())
                .map(|start| (start, start + text.len()))
        });

        Ok(CandidateAnswer {
            source_document_id: summary.source_document_id.clone(),
            text,
            confidence: extracted.confidence,
            span,
        })
    }
}
