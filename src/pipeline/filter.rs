use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::docs::text;
use crate::docs::types::Document;
use crate::error::{CapabilityError, CapabilityKind, DocumentFailure};

use super::cache::EmbeddingCache;
use super::capability::Embedder;

/// `(a·b) / (‖a‖·‖b‖)`. A zero-length vector scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    anyhow::ensure!(!a.is_empty() && !b.is_empty(), "Vectors must not be empty");
    anyhow::ensure!(
        a.len() == b.len(),
        "Vector length mismatch: {} != {}",
        a.len(),
        b.len()
    );

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return Ok(0.0);
    }
    Ok((dot / denom) as f32)
}

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub similarity: f32,
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Documents above the threshold, in input order.
    pub retained: Vec<ScoredDocument>,
    /// Documents that could not be scored.
    pub failures: Vec<DocumentFailure>,
    pub considered: usize,
}

pub struct RelevanceFilter {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
    strip_stop_words: bool,
    max_concurrency: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl RelevanceFilter {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32) -> Self {
        Self {
            embedder,
            threshold,
            strip_stop_words: false,
            max_concurrency: 1,
            cache: None,
        }
    }

    pub fn with_stop_word_stripping(mut self, enabled: bool) -> Self {
        self.strip_stop_words = enabled;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn embedding_input(&self, normalized: &str) -> String {
        if !self.strip_stop_words {
            return normalized.to_string();
        }
        let terms = text::content_terms(normalized);
        if terms.is_empty() {
            normalized.to_string()
        } else {
            terms
        }
    }

    async fn embed(&self, input: &str) -> Result<Vec<f32>, CapabilityError> {
        self.embedder
            .embed(input)
            .await
            .map_err(|e| CapabilityError::new(CapabilityKind::Embed, e))
    }

    async fn document_embedding(&self, doc: &Document) -> Result<Vec<f32>, CapabilityError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&doc.content_hash).await {
                return Ok(hit);
            }
        }
        let embedding = self.embed(&self.embedding_input(&doc.normalized)).await?;
        if let Some(cache) = &self.cache {
            cache.insert(&doc.content_hash, embedding.clone()).await;
        }
        Ok(embedding)
    }

    async fn score(&self, query_embedding: &[f32], doc: &Document) -> Result<f32, String> {
        let embedding = self.document_embedding(doc).await.map_err(|e| e.to_string())?;
        match cosine_similarity(query_embedding, &embedding) {
            Ok(similarity) => Ok(similarity),
            Err(e) => {
                // a vector that cannot be compared must not be served again
                if let Some(cache) = &self.cache {
                    cache.invalidate(&doc.content_hash).await;
                }
                Err(format!("{:#}", e))
            }
        }
    }

    /// Keep documents whose similarity to `query` is strictly above the threshold.
    ///
    /// Only a failure to embed the query itself is returned as an error; per-document
    /// failures are collected in the outcome.
    pub async fn filter(
        &self,
        query: &str,
        documents: &[Document],
    ) -> Result<FilterOutcome, CapabilityError> {
        let mut outcome = FilterOutcome {
            considered: documents.len(),
            ..Default::default()
        };
        if documents.is_empty() {
            return Ok(outcome);
        }

        let query_embedding = self
            .embed(&self.embedding_input(&text::normalize(query)))
            .await?;

        let scored: Vec<(&Document, Result<f32, String>)> = stream::iter(documents)
            .map(|doc| {
                let query_embedding = &query_embedding;
                async move { (doc, self.score(query_embedding, doc).await) }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        for (doc, score) in scored {
            match score {
                Ok(similarity) => {
                    debug!(doc_id = %doc.id, similarity, "document scored");
                    if similarity > self.threshold {
                        outcome.retained.push(ScoredDocument {
                            document: doc.clone(),
                            similarity,
                        });
                    }
                }
                Err(error) => {
                    warn!(doc_id = %doc.id, %error, "Failed to score document");
                    outcome.failures.push(DocumentFailure {
                        document_id: doc.id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            considered = outcome.considered,
            retained = outcome.retained.len(),
            failed = outcome.failures.len(),
            threshold = self.threshold,
            "Relevance filter complete"
        );
        if let Some(cache) = &self.cache {
            debug!(cached = cache.len().await, "embedding cache size");
        }
        Ok(outcome)
    }
}
