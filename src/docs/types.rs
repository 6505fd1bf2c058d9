use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::text;

/// Identity of one document within a corpus. Unique even when contents repeat.
pub type DocId = String;

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

/// A single chat-style document. Normalized once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    /// blake3 hex hash of `content`. Shared by documents with identical text.
    pub content_hash: String,
    /// Sender of the chat message, if the export carried one.
    pub author: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
    pub content: String,
    pub normalized: String,
}

impl Document {
    /// New document with a process-local id (`doc-N`). Loaders that know the
    /// source's own message id replace it with [`Document::with_id`].
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let id = format!("doc-{}", NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed));
        let content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        let normalized = text::normalize(&content);
        Self {
            id,
            content_hash,
            author: None,
            sent_at: None,
            content,
            normalized,
        }
    }

    pub fn with_id(mut self, id: impl Into<DocId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_sent_at(mut self, sent_at: NaiveDateTime) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    /// Split the normalized text into ordered word chunks.
    pub fn chunks(&self, chunk_size: usize) -> Vec<Chunk> {
        text::chunk(&self.normalized, chunk_size)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                source_document_id: self.id.clone(),
                text,
                ordinal,
            })
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.normalized.split_whitespace().count()
    }
}

/// A bounded word span of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source_document_id: DocId,
    pub text: String,
    pub ordinal: usize,
}

/// Chunk summaries of one document, concatenated in chunk order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub source_document_id: DocId,
    pub text: String,
    pub chunk_count: usize,
    /// Ordinals of chunks whose summarization failed and were left out.
    #[serde(default)]
    pub skipped_chunks: Vec<usize>,
}

/// One document's answer to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAnswer {
    pub source_document_id: DocId,
    pub text: String,
    pub confidence: f32,
    /// Byte range of the answer inside the summary it was extracted from.
    #[serde(default)]
    pub span: Option<(usize, usize)>,
}

/// The reconciled answer across all candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAnswer {
    pub text: String,
    pub vote_count: usize,
    /// Documents whose candidate matched `text`, in document order.
    pub supporting_documents: Vec<DocId>,
    pub total_candidates: usize,
    /// More than one text shared the top count and the tie-break decided.
    pub contested: bool,
}
