use std::collections::HashMap;

use tokio::sync::RwLock;

/// Document embeddings reused across queries against a stable corpus.
///
/// Keys are `Document::content_hash`, so an edited document never hits a stale
/// entry and repeated messages share one vector.
#[derive(Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, content_hash: &str) -> Option<Vec<f32>> {
        self.entries.read().await.get(content_hash).cloned()
    }

    pub async fn insert(&self, content_hash: &str, embedding: Vec<f32>) {
        self.entries
            .write()
            .await
            .insert(content_hash.to_string(), embedding);
    }

    /// Drop one entry. Returns whether it was present.
    pub async fn invalidate(&self, content_hash: &str) -> bool {
        self.entries.write().await.remove(content_hash).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
