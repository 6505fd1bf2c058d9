//! Scripted in-process capabilities for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::capability::{
    Capabilities, Embedder, ExtractedAnswer, QuestionAnswerer, SummaryOptions, Summarizer,
};

#[derive(Default)]
pub struct MockModel {
    /// Exact-text embeddings; unknown text embeds to `fallback_embedding`.
    pub embeddings: HashMap<String, Vec<f32>>,
    pub fallback_embedding: Vec<f32>,
    /// Texts whose embedding call fails.
    pub embed_failures: HashSet<String>,
    /// Chunk text → summary. Unknown chunks summarize to themselves.
    pub summaries: HashMap<String, String>,
    /// Chunks (by substring) whose summarization fails.
    pub summary_failures: Vec<String>,
    /// Context substring → answer. First match wins; otherwise the first word of the context.
    pub answers: Vec<(String, String)>,
    /// Context substring → artificial delay before answering.
    pub delays: Vec<(String, Duration)>,
    /// Context substrings that make the answer call panic.
    pub panics: Vec<String>,
    pub embed_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub answer_calls: AtomicUsize,
    /// Answer calls in flight right now, and the most seen at once.
    pub answer_active: AtomicUsize,
    pub answer_peak: AtomicUsize,
    /// Answer calls that ran to completion.
    pub answers_returned: AtomicUsize,
    pub seen_embed_inputs: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn total_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
            + self.summarize_calls.load(Ordering::SeqCst)
            + self.answer_calls.load(Ordering::SeqCst)
    }

    pub fn into_capabilities(self) -> (Arc<Self>, Capabilities) {
        let model = Arc::new(self);
        let caps = Capabilities::from_backend(model.clone());
        (model, caps)
    }
}

#[async_trait]
impl Embedder for MockModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen_embed_inputs.lock() {
            seen.push(text.to_string());
        }
        if self.embed_failures.contains(text) {
            bail!("embedding backend unavailable");
        }
        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback_embedding.clone()))
    }
}

#[async_trait]
impl Summarizer for MockModel {
    async fn summarize(&self, text: &str, _options: &SummaryOptions) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if self.summary_failures.iter().any(|f| text.contains(f.as_str())) {
            bail!("summarizer rejected chunk");
        }
        Ok(self
            .summaries
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

#[async_trait]
impl QuestionAnswerer for MockModel {
    async fn answer(&self, _question: &str, context: &str) -> Result<ExtractedAnswer> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        if self.panics.iter().any(|p| context.contains(p.as_str())) {
            panic!("scripted panic while answering");
        }
        let active = self.answer_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.answer_peak.fetch_max(active, Ordering::SeqCst);
        if let Some((_, delay)) = self.delays.iter().find(|(k, _)| context.contains(k.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        self.answer_active.fetch_sub(1, Ordering::SeqCst);
        self.answers_returned.fetch_add(1, Ordering::SeqCst);
        let text = self
            .answers
            .iter()
            .find(|(k, _)| context.contains(k.as_str()))
            .map(|(_, a)| a.clone())
            .unwrap_or_else(|| context.split_whitespace().next().unwrap_or("").to_string());
        Ok(ExtractedAnswer {
            text,
            confidence: 0.9,
            span: None,
        })
    }
}
