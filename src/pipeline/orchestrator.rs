use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::docs::types::{CandidateAnswer, DocId, Document};
use crate::error::DocumentError;

use super::extract::AnswerExtractor;
use super::summarize::SummarizerStage;

/// Result of one document's chunk → summarize → extract task.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub document_id: DocId,
    pub result: Result<CandidateAnswer, DocumentError>,
}

/// Aborts the tasks it tracks when dropped, so a cancelled query stops its model calls.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Fans documents out to a bounded set of concurrent tasks and collects one
/// outcome per document, in input order.
pub struct Orchestrator {
    summarizer: Arc<SummarizerStage>,
    extractor: Arc<AnswerExtractor>,
    chunk_size: usize,
    max_concurrency: usize,
    task_timeout: Duration,
}

impl Orchestrator {
    pub fn new(summarizer: SummarizerStage, extractor: AnswerExtractor, chunk_size: usize) -> Self {
        Self {
            summarizer: Arc::new(summarizer),
            extractor: Arc::new(extractor),
            chunk_size,
            max_concurrency: 1,
            task_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub async fn answer_query(&self, query: &str, documents: Vec<Document>) -> Vec<DocumentOutcome> {
        let limit = Arc::new(Semaphore::new(self.max_concurrency));
        let query: Arc<str> = Arc::from(query);
        let total = documents.len();

        info!(
            documents = total,
            max_concurrency = self.max_concurrency,
            "Dispatching document tasks"
        );

        let (ids, handles): (Vec<DocId>, Vec<_>) = documents
            .into_iter()
            .map(|doc| {
                let id = doc.id.clone();
                let limit = limit.clone();
                let query = query.clone();
                let summarizer = self.summarizer.clone();
                let extractor = self.extractor.clone();
                let chunk_size = self.chunk_size;
                let timeout = self.task_timeout;

                let handle = tokio::spawn(async move {
                    let _permit = limit
                        .acquire_owned()
                        .await
                        .map_err(|e| DocumentError::Aborted(e.to_string()))?;
                    let work = process_document(&summarizer, &extractor, &query, &doc, chunk_size);
                    match tokio::time::timeout(timeout, work).await {
                        Ok(result) => result,
                        Err(_) => Err(DocumentError::TimedOut(timeout)),
                    }
                });
                (id, handle)
            })
            .unzip();

        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());
        let joined = futures::future::join_all(handles).await;

        let outcomes: Vec<DocumentOutcome> = ids
            .into_iter()
            .zip(joined)
            .map(|(document_id, joined)| {
                let result = joined.unwrap_or_else(|e| Err(DocumentError::Aborted(e.to_string())));
                if let Err(error) = &result {
                    warn!(doc_id = %document_id, %error, "Document task failed");
                }
                DocumentOutcome {
                    document_id,
                    result,
                }
            })
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        info!(
            documents = total,
            succeeded,
            failed = total - succeeded,
            "Document tasks complete"
        );
        outcomes
    }
}

async fn process_document(
    summarizer: &SummarizerStage,
    extractor: &AnswerExtractor,
    query: &str,
    doc: &Document,
    chunk_size: usize,
) -> Result<CandidateAnswer, DocumentError> {
    let chunks = doc.chunks(chunk_size);
    debug!(doc_id = %doc.id, chunks = chunks.len(), "processing document");
    let summary = summarizer.summarize(&chunks).await?;
    let candidate = extractor.extract(query, &summary).await?;
    debug!(doc_id = %doc.id, answer = %candidate.text, confidence = candidate.confidence, "candidate extracted");
    Ok(candidate)
}
