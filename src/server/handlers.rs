//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::state::AppState;
use crate::error::RagError;
use crate::guard::EventType;
use crate::pipeline::QueryOptions;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/chat", post(chat))
        .route("/api/documents", post(add_document))
        .route("/api/documents", delete(clear_documents))
        .route("/api/logs", get(get_logs))
        .route("/api/logs", delete(clear_logs));

    if state.config.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }
    if state.config.logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn error_response(err: &RagError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RagError::LlmUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": err.to_string()})))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Status endpoint
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ollama_connected = state.ollama.check_connection().await;

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime().as_secs(),
        "ollama_connected": ollama_connected,
        "documents_count": state.pipeline.documents_count(),
        "sources": state.pipeline.sources(),
    }))
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    5
}

fn default_temperature() -> f32 {
    0.7
}

/// Chat request
#[derive(Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default = "default_true")]
    pub guardrails: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Run a query through the guarded or unguarded pipeline
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let opts = QueryOptions {
        guardrails: req.guardrails,
        system_prompt: req.system_prompt,
        top_k: req.top_k,
        temperature: req.temperature,
    };

    match state.pipeline.query(&req.query, opts).await {
        Ok(response) => (StatusCode::OK, Json(serde_json::json!(response))),
        Err(e) => {
            let (status, body) = error_response(&e);
            (status, body)
        },
    }
}

/// Document ingestion request
#[derive(Deserialize)]
pub struct AddDocumentRequest {
    pub filename: String,
    pub content: String,
}

/// Ingest a text document
async fn add_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddDocumentRequest>,
) -> impl IntoResponse {
    match state.pipeline.add_document(&req.filename, &req.content) {
        Ok(chunks_created) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "filename": req.filename,
                "chunks_created": chunks_created,
            })),
        ),
        Err(e) => {
            let (status, body) = error_response(&e);
            (status, body)
        },
    }
}

/// Remove all ingested documents
async fn clear_documents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.pipeline.clear_documents();
    Json(serde_json::json!({"success": true}))
}

fn default_limit() -> usize {
    50
}

/// Log query parameters
#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub event_type: Option<EventType>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Fetch security events and summary statistics
async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> impl IntoResponse {
    let logger = &state.pipeline.guards().logger;
    let events = logger.events(params.event_type, 0.0, params.limit);
    let summary = logger.summary();

    Json(serde_json::json!({
        "events": events,
        "summary": summary,
    }))
}

/// Clear the security event log
async fn clear_logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.pipeline.guards().logger.clear_events();
    Json(serde_json::json!({"success": true}))
}
