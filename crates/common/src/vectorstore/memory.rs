//! Brute-force in-memory vectorstore

use super::{Document, ScoredDocument, VectorStore};
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

struct Entry {
    id: String,
    document: Document,
    embedding: Vec<f32>,
}

/// Vectorstore kept entirely in process memory
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Build a store pre-loaded with `documents`
    pub async fn from_documents(
        embedder: Arc<dyn Embedder>,
        documents: &[Document],
    ) -> Result<Self> {
        let store = Self::new(embedder);
        store.add_documents(documents).await?;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

fn poisoned() -> AppError {
    AppError::VectorStore {
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read().map_err(|_| poisoned())?;
        let mut scored: Vec<ScoredDocument> = entries
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn add_documents(&self, documents: &[Document]) -> Result<Vec<String>> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let mut ids = Vec::with_capacity(documents.len());
        for (document, embedding) in documents.iter().zip(embeddings) {
            let id = Uuid::new_v4().to_string();
            entries.push(Entry {
                id: id.clone(),
                document: document.clone(),
                embedding,
            });
            ids.push(id);
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self
            .entries
            .read()
            .map(|e| e.iter().map(|entry| entry.id.clone()).collect())
            .unwrap_or_default();
        f.debug_struct("InMemoryVectorStore")
            .field("model", &self.embedder.model_name())
            .field("ids", &ids)
            .finish()
    }
}
