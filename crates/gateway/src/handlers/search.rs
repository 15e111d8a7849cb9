//! Search handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::validation_error;
use crate::AppState;
use ragline_common::{errors::Result, metrics};

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    /// Maximum results to return
    #[serde(default = "default_k")]
    #[validate(range(min = 1, max = 20))]
    pub k: usize,
}

fn default_k() -> usize { 4 }

/// Search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f64,
}

/// Similarity search over the collection
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    request.validate().map_err(validation_error)?;

    let results = state
        .store
        .similarity_search_with_score(&request.query, request.k)
        .await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    metrics::record_search(processing_time_ms as f64 / 1000.0, results.len());

    tracing::info!(
        k = request.k,
        results = results.len(),
        latency_ms = processing_time_ms,
        "Search completed"
    );

    let results: Vec<SearchResultItem> = results
        .into_iter()
        .map(|r| SearchResultItem {
            content: r.document.page_content,
            metadata: r.document.metadata,
            score: r.score,
        })
        .collect();

    Ok(Json(SearchResponse {
        query: request.query,
        count: results.len(),
        results,
    }))
}
