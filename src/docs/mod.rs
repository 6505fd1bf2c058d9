pub mod ingest;
pub mod text;
pub mod types;

use std::collections::BTreeMap;

use types::Document;

/// In-memory document collection for one run.
pub struct Corpus {
    docs: Vec<Document>,
}

impl Corpus {
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// List documents, newest first. Undated documents sort last, keeping input order.
    pub fn list(&self, limit: usize) -> Vec<&Document> {
        let mut results: Vec<&Document> = self.docs.iter().collect();
        results.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        results.truncate(limit);
        results
    }

    /// Group the newest `limit` documents by author.
    pub fn by_author(&self, limit: usize) -> BTreeMap<String, Vec<&Document>> {
        let mut grouped: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
        for doc in self.list(limit) {
            let author = doc.author.clone().unwrap_or_else(|| "(unknown)".to_string());
            grouped.entry(author).or_default().push(doc);
        }
        grouped
    }
}
