//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for sales QA, image identification, biodiversity Q&A
//! and raw completions.

use crate::cli::preflight::Operation;
use crate::cli::{user_message, Output, APOLOGY_REPLY};
use crate::completion::{ChatMessage, CompletionInput};
use crate::config::Settings;
use crate::error::CopilotoError;
use crate::orchestrator::Services;
use crate::rag::RetrievedChunk;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

/// Largest accepted image upload.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state.
struct AppState {
    services: Services,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let services = super::build_services(Operation::Serve, settings)?;
    if let Some(reason) = services.qa().unavailable_reason() {
        Output::warning(&format!("Sales QA disabled: {}", reason));
    }

    let state = Arc::new(AppState { services });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Copiloto API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask (sales)", "POST /ask");
    Output::kv("Identify image", "POST /identify");
    Output::kv("Biodiversity", "POST /bio");
    Output::kv("Completion", "POST /complete");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route(
            "/identify",
            post(identify).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/bio", post(bio))
        .route("/complete", post(complete))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<RetrievedChunk>,
}

#[derive(Deserialize)]
struct BioRequest {
    question: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CompleteRequest {
    input: Value,
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP status for a failed request.
fn status_for(err: &CopilotoError) -> StatusCode {
    match err {
        CopilotoError::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CopilotoError::CompletionRequest { .. } => StatusCode::BAD_GATEWAY,
        CopilotoError::UnsupportedInput(_) | CopilotoError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: CopilotoError) -> Response {
    let status = status_for(&err);
    let message = match &err {
        CopilotoError::CompletionRequest { .. } => APOLOGY_REPLY.to_string(),
        CopilotoError::UnsupportedInput(_) => err.to_string(),
        other => user_message(other),
    };

    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Rejected request: {}", err);
    }

    (status, Json(ErrorResponse { error: message })).into_response()
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "index_available": state.services.qa().is_available(),
    }))
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    match state.services.ask(&req.question).await {
        Ok(result) => Json(AskResponse {
            answer: result.answer,
            sources: result.sources,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn identify(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match state.services.identify("upload", &body).await {
        Ok(identification) => Json(identification).into_response(),
        Err(e) => error_response(e),
    }
}

async fn bio(State(state): State<Arc<AppState>>, Json(req): Json<BioRequest>) -> Response {
    match state.services.ask_biodiversity(&req.question, &req.history).await {
        Ok(answer) => Json(AnswerResponse { answer }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn complete(State(state): State<Arc<AppState>>, Json(req): Json<CompleteRequest>) -> Response {
    let input = match CompletionInput::from_value(req.input) {
        Ok(input) => input,
        Err(e) => return error_response(e),
    };

    match state.services.complete(input).await {
        Ok(answer) => Json(AnswerResponse { answer }).into_response(),
        Err(e) => error_response(e),
    }
}
