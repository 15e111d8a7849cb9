//! Vectorstore abstraction
//!
//! Documents are stored with their embeddings and retrieved by similarity.
//! Two implementations:
//! - [`PgVectorStore`] on PostgreSQL with the `vector` extension
//! - [`InMemoryVectorStore`] for local runs and tests

mod memory;
mod pgvector;

pub use memory::InMemoryVectorStore;
pub use pgvector::{initialize_vectorstore, PgVectorStore};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Unit of retrieval: page content plus free-form metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default = "empty_metadata")]
    pub metadata: serde_json::Value,
}

fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: empty_metadata(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Document with its similarity to the query (cosine, higher is closer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

/// Common trait for vector stores
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top-`k` documents for `query`, most similar first
    async fn similarity_search_with_score(&self, query: &str, k: usize)
        -> Result<Vec<ScoredDocument>>;

    /// Embed and store documents, returning their ids
    async fn add_documents(&self, documents: &[Document]) -> Result<Vec<String>>;

    /// Top-`k` documents for `query` without scores
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .similarity_search_with_score(query, k)
            .await?
            .into_iter()
            .map(|scored| scored.document)
            .collect())
    }
}

/// Format an embedding as a pgvector literal, e.g. `[0.1,0.2]`
pub(crate) fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}
