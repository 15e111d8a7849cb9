//! Document ingestion handler

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation_error;
use crate::AppState;
use ragline_common::{
    errors::{AppError, Result},
    metrics,
    vectorstore::Document,
};

/// Documents accepted per request
const MAX_DOCUMENTS_PER_REQUEST: usize = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct AddDocumentsRequest {
    #[validate(nested)]
    pub documents: Vec<DocumentInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentInput {
    #[validate(length(min = 1, max = 50000))]
    pub content: String,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AddDocumentsResponse {
    pub ids: Vec<String>,
    pub count: usize,
}

/// Embed and store documents in the collection
pub async fn add_documents(
    State(state): State<AppState>,
    Json(request): Json<AddDocumentsRequest>,
) -> Result<(StatusCode, Json<AddDocumentsResponse>)> {
    if request.documents.is_empty() {
        return Err(AppError::Validation {
            message: "At least one document is required".to_string(),
            field: Some("documents".to_string()),
        });
    }

    if request.documents.len() > MAX_DOCUMENTS_PER_REQUEST {
        return Err(AppError::PayloadTooLarge {
            size: request.documents.len(),
            limit: MAX_DOCUMENTS_PER_REQUEST,
        });
    }

    request.validate().map_err(validation_error)?;

    let documents: Vec<Document> = request
        .documents
        .into_iter()
        .map(|input| {
            let doc = Document::new(input.content);
            match input.metadata {
                Some(metadata) => doc.with_metadata(metadata),
                None => doc,
            }
        })
        .collect();

    let ids = state.store.add_documents(&documents).await?;
    metrics::record_documents_ingested(ids.len());

    tracing::info!(count = ids.len(), "Documents added");

    Ok((
        StatusCode::CREATED,
        Json(AddDocumentsResponse {
            count: ids.len(),
            ids,
        }),
    ))
}
