//! Static root and docs handlers

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub docs: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RouteDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub summary: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DocsResponse {
    pub routes: Vec<RouteDoc>,
}

/// Welcome payload, independent of database and LLM state
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to the RAG API!",
        docs: "/docs",
        health: "/health",
    })
}

/// Route index
pub async fn docs() -> Json<DocsResponse> {
    let route = |method, path, summary| RouteDoc { method, path, summary };

    Json(DocsResponse {
        routes: vec![
            route("GET", "/", "Welcome message"),
            route("GET", "/health", "Service health and database connectivity"),
            route("GET", "/docs", "This route index"),
            route("POST", "/search", "Similarity search: {query, k}"),
            route("POST", "/rag", "Answer a question from retrieved documents: {question, k}"),
            route("POST", "/documents", "Add documents to the collection: {documents: [{content, metadata}]}"),
            route("GET", "/metrics", "Prometheus metrics"),
        ],
    })
}
