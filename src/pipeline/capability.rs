use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Generation bounds for one summarization call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummaryOptions {
    pub max_length: usize,
    pub min_length: usize,
    /// Sampling off means deterministic output.
    pub sample: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            max_length: 100,
            min_length: 30,
            sample: false,
        }
    }
}

/// Answer span returned by an extractive QA model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedAnswer {
    pub text: String,
    pub confidence: f32,
    /// Byte range inside the context, when the model reports one.
    pub span: Option<(usize, usize)>,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<String>;
}

#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, question: &str, context: &str) -> Result<ExtractedAnswer>;
}

/// Model handles shared by every pipeline stage. Built once at startup.
#[derive(Clone)]
pub struct Capabilities {
    pub embedder: Arc<dyn Embedder>,
    pub summarizer: Arc<dyn Summarizer>,
    pub reader: Arc<dyn QuestionAnswerer>,
}

impl Capabilities {
    /// Use one backend for all three capabilities.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: Embedder + Summarizer + QuestionAnswerer + 'static,
    {
        Self {
            embedder: backend.clone(),
            summarizer: backend.clone(),
            reader: backend,
        }
    }
}

/// Serializes every call into a backend that cannot take concurrent requests.
pub struct Exclusive<B> {
    inner: Mutex<B>,
}

impl<B> Exclusive<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl<B: Embedder> Embedder for Exclusive<B> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let guard = self.inner.lock().await;
        guard.embed(text).await
    }
}

#[async_trait]
impl<B: Summarizer> Summarizer for Exclusive<B> {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<String> {
        let guard = self.inner.lock().await;
        guard.summarize(text, options).await
    }
}

#[async_trait]
impl<B: QuestionAnswerer> QuestionAnswerer for Exclusive<B> {
    async fn answer(&self, question: &str, context: &str) -> Result<ExtractedAnswer> {
        let guard = self.inner.lock().await;
        guard.answer(question, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for Probe {
        async fn summarize(&self, text: &str, _options: &SummaryOptions) -> Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(text.to_string())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exclusive_serializes_calls() {
        let shared = Arc::new(Exclusive::new(Probe::default()));
        let opts = SummaryOptions::default();
        let calls = (0..8).map(|i| {
            let shared = shared.clone();
            tokio::spawn(async move { shared.summarize(&i.to_string(), &opts).await })
        });
        for handle in futures::future::join_all(calls).await {
            handle.unwrap().unwrap();
        }
        let guard = shared.inner.lock().await;
        assert_eq!(guard.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_summary_options_are_deterministic() {
        let opts = SummaryOptions::default();
        assert_eq!((opts.max_length, opts.min_length, opts.sample), (100, 30, false));
    }
}
