//! RAG handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::validation_error;
use crate::AppState;
use ragline_common::{errors::Result, metrics};

#[derive(Debug, Deserialize, Validate)]
pub struct RagRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,

    /// Documents returned for display alongside the answer
    #[serde(default = "default_k")]
    #[validate(range(min = 1, max = 20))]
    pub k: usize,
}

fn default_k() -> usize { 3 }

#[derive(Debug, Serialize)]
pub struct RagResponse {
    pub question: String,
    pub answer: String,
    pub retrieved_documents: Vec<RetrievedDocument>,
    pub retrieved_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Answer a question through the RAG chain
pub async fn rag(
    State(state): State<AppState>,
    Json(request): Json<RagRequest>,
) -> Result<Json<RagResponse>> {
    let start = Instant::now();

    request.validate().map_err(validation_error)?;

    let mode = if state.chain.is_llm_backed() { "llm" } else { "fallback" };

    let result = tokio::try_join!(
        state.chain.answer(&request.question),
        state.store.similarity_search(&request.question, request.k),
    );

    let elapsed = start.elapsed();
    metrics::record_rag(elapsed.as_secs_f64(), mode, result.is_ok());
    let (answer, documents) = result?;

    tracing::info!(
        mode,
        k = request.k,
        retrieved = documents.len(),
        latency_ms = elapsed.as_millis() as u64,
        "RAG answer generated"
    );

    let retrieved_documents: Vec<RetrievedDocument> = documents
        .into_iter()
        .map(|d| RetrievedDocument {
            content: d.page_content,
            metadata: d.metadata,
        })
        .collect();

    Ok(Json(RagResponse {
        question: request.question,
        answer,
        retrieved_count: retrieved_documents.len(),
        retrieved_documents,
    }))
}
