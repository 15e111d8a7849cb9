//! Ragline API Gateway
//!
//! HTTP entry point for the RAG service.
//! Handles:
//! - Startup: wait for PostgreSQL, initialize the vectorstore, build the LLM
//!   and the RAG chain
//! - Routing for root, health, docs, search, RAG and document ingestion
//! - Observability (logging, metrics, request ids)

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ragline_common::{
    config::Settings,
    db::{self, RetryPolicy},
    embeddings, llm, metrics,
    rag::RagChain,
    vectorstore::{self, VectorStore},
    VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers.
///
/// Built once before serving; every field is read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn VectorStore>,
    pub chain: Arc<RagChain>,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn VectorStore>, chain: RagChain) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            chain: Arc::new(chain),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = Settings::load();
    init_tracing(settings.as_ref().ok());

    let settings = settings.map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        version = VERSION,
        app = %settings.app_name,
        debug = settings.debug,
        "Starting Ragline API Gateway"
    );

    // Initialize metrics
    let metrics_handle = PrometheusBuilder::new()
        .set_buckets(metrics::GENERATION_BUCKETS)?
        .install_recorder()?;
    metrics::register_metrics();

    // Startup sequence: database, vectorstore, LLM, chain
    db::wait_for_postgres(&settings.database_url(), RetryPolicy::default())
        .await
        .map_err(|e| {
            error!(error = %e, "PostgreSQL never became reachable");
            e
        })?;

    info!("Initializing vectorstore...");
    let embedder = embeddings::create_embedder(&settings)?;
    let store: Arc<dyn VectorStore> =
        Arc::new(vectorstore::initialize_vectorstore(&settings, embedder).await?);

    let llm = llm::create_llm_from_config(&settings)?;
    match &llm {
        Some(llm) => info!(model = llm.model_name(), "LLM configured"),
        None => warn!("OPENAI_API_KEY not set, RAG answers use the retrieval-only fallback"),
    }

    let chain = RagChain::new(store.clone(), llm);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let state = AppState::new(settings, store, chain);

    // Build the router
    let app = create_router(state, Some(metrics_handle));

    info!(address = %addr, "Application ready, listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the `DEBUG` flag.
fn init_tracing(settings: Option<&Settings>) {
    let debug = settings.map(|s| s.debug).unwrap_or(false);
    let json = settings.map(|s| s.log_json).unwrap_or(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut router = Router::new()
        .route("/", get(handlers::root::root))
        .route("/docs", get(handlers::root::docs))
        .route("/health", get(handlers::health::health))
        .route("/search", post(handlers::search::search))
        .route("/rag", post(handlers::rag::rag))
        .route("/documents", post(handlers::documents::add_documents));

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ragline_common::{
        embeddings::HashEmbedder,
        errors::Result,
        llm::ChatModel,
        vectorstore::{Document, InMemoryVectorStore},
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    struct CountingLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for CountingLlm {
        async fn invoke(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("generated from {} chars", prompt.len()))
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    /// Settings pointing at a port nothing listens on
    fn unreachable_settings() -> Settings {
        Settings {
            postgres_host: "127.0.0.1".into(),
            postgres_port: 1,
            health_probe_timeout_secs: 5,
            ..Settings::default()
        }
    }

    async fn test_store() -> Arc<InMemoryVectorStore> {
        let docs = vec![
            Document::new("pgvector adds vector similarity search to PostgreSQL")
                .with_metadata(json!({"source": "pgvector.md"})),
            Document::new("axum is a web framework built on tokio and tower"),
            Document::new("Sourdough bread needs a starter"),
        ];
        Arc::new(
            InMemoryVectorStore::from_documents(Arc::new(HashEmbedder::new(512)), &docs)
                .await
                .unwrap(),
        )
    }

    async fn app_with(llm: Option<Arc<dyn ChatModel>>) -> Router {
        let store: Arc<dyn VectorStore> = test_store().await;
        let chain = RagChain::new(store.clone(), llm);
        create_router(AppState::new(unreachable_settings(), store, chain), None)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = assert_ok!(app.oneshot(request).await);
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_returns_welcome_payload() {
        let (status, body) = send(app_with(None).await, get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "message": "Welcome to the RAG API!",
                "docs": "/docs",
                "health": "/health"
            })
        );
    }

    #[tokio::test]
    async fn test_health_reports_disconnected_database() {
        let (status, body) = send(app_with(None).await, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "disconnected");
        assert_eq!(body["openai_configured"], false);
        assert_eq!(body["version"], VERSION);
    }

    #[tokio::test]
    async fn test_docs_lists_routes() {
        let (status, body) = send(app_with(None).await, get_req("/docs")).await;
        assert_eq!(status, StatusCode::OK);
        let paths: Vec<&str> = body["routes"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["path"].as_str())
            .collect();
        assert!(paths.contains(&"/rag"));
        assert!(paths.contains(&"/health"));
    }

    #[tokio::test]
    async fn test_rag_fallback_without_llm() {
        let question = "How does vector similarity search work in PostgreSQL?";
        let (status, body) = send(
            app_with(None).await,
            post_json("/rag", json!({ "question": question })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"], question);
        let answer = body["answer"].as_str().unwrap();
        assert!(answer.contains(question));
        assert!(answer.contains("- pgvector adds vector similarity search to PostgreSQL"));
        assert_eq!(body["retrieved_count"], 3);
        assert_eq!(body["retrieved_documents"][0]["metadata"]["source"], "pgvector.md");
    }

    #[tokio::test]
    async fn test_rag_uses_llm_when_configured() {
        let llm = Arc::new(CountingLlm {
            calls: AtomicUsize::new(0),
        });
        let app = app_with(Some(llm.clone())).await;

        let (status, body) = send(
            app,
            post_json("/rag", json!({ "question": "What is axum?", "k": 1 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["answer"].as_str().unwrap().starts_with("generated from"));
        assert_eq!(body["retrieved_count"], 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rag_rejects_empty_question() {
        let (status, body) = send(
            app_with(None).await,
            post_json("/rag", json!({ "question": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "question");
    }

    #[tokio::test]
    async fn test_search_returns_scored_results() {
        let (status, body) = send(
            app_with(None).await,
            post_json("/search", json!({ "query": "web framework tokio", "k": 2 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(
            body["results"][0]["content"],
            "axum is a web framework built on tokio and tower"
        );
        assert!(body["results"][0]["score"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_search_rejects_out_of_range_k() {
        let (status, _) = send(
            app_with(None).await,
            post_json("/search", json!({ "query": "anything", "k": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_documents_then_search() {
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(HashEmbedder::new(256))));
        let dyn_store: Arc<dyn VectorStore> = store.clone();
        let chain = RagChain::new(dyn_store.clone(), None);
        let app = create_router(AppState::new(unreachable_settings(), dyn_store, chain), None);

        let (status, body) = send(
            app.clone(),
            post_json(
                "/documents",
                json!({ "documents": [
                    { "content": "Tokio is an async runtime", "metadata": { "page": 1 } },
                    { "content": "Serde serializes Rust data structures" }
                ]}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["count"], 2);
        assert_eq!(store.len(), 2);

        let (_, body) = send(
            app,
            post_json("/search", json!({ "query": "async runtime", "k": 1 })),
        )
        .await;
        assert_eq!(body["results"][0]["metadata"]["page"], 1);
    }

    #[tokio::test]
    async fn test_add_documents_rejects_empty_batch() {
        let (status, body) = send(
            app_with(None).await,
            post_json("/documents", json!({ "documents": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "documents");
    }

    #[tokio::test]
    async fn test_add_documents_reports_nested_field() {
        let (status, body) = send(
            app_with(None).await,
            post_json("/documents", json!({ "documents": [{ "content": "" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "documents");

        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("documents[0].content"), "{}", message);
        assert!(message.contains("length must be between 1 and 50000"), "{}", message);
        assert!(!message.contains("Number("), "{}", message);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = app_with(None).await.oneshot(get_req("/")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
