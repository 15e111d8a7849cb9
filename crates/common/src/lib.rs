//! Ragline Common Library
//!
//! Shared code for the Ragline services including:
//! - Settings loaded from the environment
//! - Database startup checks and connection pooling
//! - Embedding and chat model clients
//! - pgvector-backed vectorstore
//! - The RAG chain
//! - Error types and metrics

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod rag;
pub mod vectorstore;

// Re-export commonly used types
pub use config::Settings;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::ChatModel;
pub use rag::RagChain;
pub use vectorstore::{Document, VectorStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
