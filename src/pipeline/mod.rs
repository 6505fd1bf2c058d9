pub mod cache;
pub mod capability;
pub mod extract;
pub mod filter;
pub mod orchestrator;
pub mod prompts;
pub mod summarize;
pub mod verify;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::docs::types::{CandidateAnswer, Document, VerifiedAnswer};
use crate::error::{DocumentFailure, PipelineError};
use crate::state::PipelineConfig;

use cache::EmbeddingCache;
use capability::Capabilities;
use extract::AnswerExtractor;
use filter::RelevanceFilter;
use orchestrator::Orchestrator;
use summarize::SummarizerStage;

#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    pub question: String,
    pub answer: VerifiedAnswer,
    /// Every successful candidate, in document order.
    pub candidates: Vec<CandidateAnswer>,
    /// Documents dropped while scoring or answering.
    pub failures: Vec<DocumentFailure>,
    pub considered: usize,
    pub relevant: usize,
}

/// Filter → per-document answer → vote.
pub struct Pipeline {
    filter: RelevanceFilter,
    orchestrator: Orchestrator,
}

impl Pipeline {
    pub fn new(capabilities: Capabilities, config: &PipelineConfig) -> Self {
        let mut filter = RelevanceFilter::new(capabilities.embedder, config.similarity_threshold)
            .with_stop_word_stripping(config.strip_stop_words)
            .with_concurrency(config.max_concurrency);
        if config.cache_embeddings {
            filter = filter.with_cache(Arc::new(EmbeddingCache::new()));
        }

        let orchestrator = Orchestrator::new(
            SummarizerStage::new(capabilities.summarizer, config.summary_options()),
            AnswerExtractor::new(capabilities.reader),
            config.chunk_size,
        )
        .with_concurrency(config.max_concurrency)
        .with_task_timeout(config.task_timeout);

        Self {
            filter,
            orchestrator,
        }
    }

    pub async fn run(
        &self,
        question: &str,
        documents: &[Document],
    ) -> Result<PipelineResponse, PipelineError> {
        info!(question, documents = documents.len(), "Starting pipeline");

        let filtered = self.filter.filter(question, documents).await?;
        let considered = filtered.considered;
        let relevant = filtered.retained.len();
        if relevant == 0 {
            if !filtered.failures.is_empty() {
                warn!(
                    considered,
                    failed = filtered.failures.len(),
                    "No document retained and some could not be scored"
                );
                return Err(PipelineError::ScoringFailed {
                    considered,
                    failures: filtered.failures,
                });
            }
            info!(considered, "No relevant documents");
            return Err(PipelineError::NoRelevantDocuments { considered });
        }

        let mut failures = filtered.failures;
        let relevant_docs: Vec<Document> = filtered
            .retained
            .into_iter()
            .map(|scored| {
                debug!(doc_id = %scored.document.id, similarity = scored.similarity, "relevant");
                scored.document
            })
            .collect();

        let outcomes = self.orchestrator.answer_query(question, relevant_docs).await;

        let mut candidates = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome.result {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => failures.push(DocumentFailure::new(&outcome.document_id, &e)),
            }
        }

        let Some(answer) = verify::verify(&candidates) else {
            warn!(relevant, "Every relevant document failed to produce an answer");
            return Err(PipelineError::AnsweringFailed { relevant, failures });
        };

        if answer.contested {
            warn!(
                answer = %answer.text,
                vote_count = answer.vote_count,
                "Tied vote, kept the earliest document's answer"
            );
        }
        info!(
            answer = %answer.text,
            vote_count = answer.vote_count,
            candidates = candidates.len(),
            failed = failures.len(),
            "Pipeline complete"
        );

        Ok(PipelineResponse {
            question: question.to_string(),
            answer,
            candidates,
            failures,
            considered,
            relevant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use super::testing::MockModel;

    fn config() -> PipelineConfig {
        PipelineConfig {
            max_concurrency: 4,
            ..Default::default()
        }
    }

    /// Query and both matching documents embed to the same direction.
    fn x_model() -> MockModel {
        let mut model = MockModel::default();
        model.embeddings.insert("What is X?".to_string(), vec![1.0, 0.0]);
        model
            .embeddings
            .insert("X is a thing.".to_string(), vec![0.95, 0.05]);
        model
            .embeddings
            .insert("Unrelated chatter about lunch.".to_string(), vec![0.0, 1.0]);
        model
            .summaries
            .insert("X is a thing.".to_string(), "X is a thing.".to_string());
        model
            .answers
            .push(("X is a thing.".to_string(), "a thing".to_string()));
        model
    }

    #[tokio::test]
    async fn test_end_to_end_two_agreeing_documents() {
        let (model, caps) = x_model().into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![
            Document::new("X is a thing.").with_author("alice"),
            Document::new("Unrelated chatter about lunch."),
            Document::new("X is  a\nthing.").with_author("bob"),
        ];

        let response = pipeline.run("What is X?", &docs).await.unwrap();
        assert_eq!(response.answer.text, "a thing");
        assert_eq!(response.answer.vote_count, 2);
        assert_eq!(response.relevant, 2);
        assert_eq!(response.considered, 3);
        assert!(response.failures.is_empty());
        assert_eq!(
            response.answer.supporting_documents,
            vec![docs[0].id.clone(), docs[2].id.clone()]
        );

        let json = serde_json::to_value(&response.answer).unwrap();
        assert_eq!(json["text"], "a thing");
        assert_eq!(json["vote_count"], 2);
        assert_eq!(model.summarize_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_identical_documents_vote_separately() {
        let (_model, caps) = x_model().into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![Document::new("X is a thing."), Document::new("X is a thing.")];
        assert_ne!(docs[0].id, docs[1].id);

        let response = pipeline.run("What is X?", &docs).await.unwrap();
        assert_eq!(response.answer.text, "a thing");
        assert_eq!(response.answer.vote_count, 2);
        assert_eq!(
            response.answer.supporting_documents,
            vec![docs[0].id.clone(), docs[1].id.clone()]
        );
        let sources: Vec<&str> = response
            .candidates
            .iter()
            .map(|c| c.source_document_id.as_str())
            .collect();
        assert_eq!(sources, vec![docs[0].id.as_str(), docs[1].id.as_str()]);
    }

    #[tokio::test]
    async fn test_every_document_failing_to_embed_is_scoring_failed() {
        let mut model = x_model();
        model.embed_failures.insert("X is a thing.".to_string());
        model
            .embed_failures
            .insert("Unrelated chatter about lunch.".to_string());
        let (model, caps) = model.into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![
            Document::new("X is a thing."),
            Document::new("Unrelated chatter about lunch."),
        ];

        match pipeline.run("What is X?", &docs).await {
            Err(PipelineError::ScoringFailed { considered, failures }) => {
                assert_eq!(considered, 2);
                let ids: Vec<&str> = failures.iter().map(|f| f.document_id.as_str()).collect();
                assert_eq!(ids, vec![docs[0].id.as_str(), docs[1].id.as_str()]);
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.answer)),
        }
        assert_eq!(model.summarize_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_no_relevant_documents_without_calls() {
        let (model, caps) = x_model().into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let err = pipeline.run("What is X?", &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoRelevantDocuments { considered: 0 }));
        assert_eq!(model.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_nothing_above_threshold() {
        let (_model, caps) = x_model().into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![Document::new("Unrelated chatter about lunch.")];
        let err = pipeline.run("What is X?", &docs).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoRelevantDocuments { considered: 1 }));
    }

    #[tokio::test]
    async fn test_partial_failure_still_answers() {
        let mut model = x_model();
        model
            .embeddings
            .insert("X is broken here".to_string(), vec![1.0, 0.0]);
        model.summary_failures.push("broken".to_string());
        let (_model, caps) = model.into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![Document::new("X is broken here"), Document::new("X is a thing.")];

        let response = pipeline.run("What is X?", &docs).await.unwrap();
        assert_eq!(response.answer.text, "a thing");
        assert_eq!(response.answer.vote_count, 1);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].document_id, docs[0].id);
    }

    #[tokio::test]
    async fn test_all_documents_failing_is_answering_failed() {
        let mut model = x_model();
        model.summary_failures.push("thing".to_string());
        let (_model, caps) = model.into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![Document::new("X is a thing.")];

        match pipeline.run("What is X?", &docs).await {
            Err(PipelineError::AnsweringFailed { relevant, failures }) => {
                assert_eq!(relevant, 1);
                assert_eq!(failures.len(), 1);
                let expected = DocumentError::Empty.to_string();
                assert_ne!(failures[0].error, expected);
                assert!(failures[0].error.contains("summarize"));
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.answer)),
        }
    }

    #[tokio::test]
    async fn test_answering_failed_counts_relevant_apart_from_scoring_failures() {
        let mut model = x_model();
        model.embed_failures.insert("Unrelated chatter about lunch.".to_string());
        model.summary_failures.push("thing".to_string());
        let (_model, caps) = model.into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let docs = vec![
            Document::new("Unrelated chatter about lunch."),
            Document::new("X is a thing."),
        ];

        let err = pipeline.run("What is X?", &docs).await.unwrap_err();
        match &err {
            PipelineError::AnsweringFailed { relevant, failures } => {
                assert_eq!(*relevant, 1);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().starts_with("answering failed for all 1 relevant"));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_surfaces_as_capability_error() {
        let mut model = x_model();
        model.embed_failures.insert("What is X?".to_string());
        let (_model, caps) = model.into_capabilities();
        let pipeline = Pipeline::new(caps, &config());
        let err = pipeline
            .run("What is X?", &[Document::new("X is a thing.")])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Capability(_)));
    }
}
