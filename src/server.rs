//! JSON HTTP API over a [`Chatbot`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer `{"query": "..."}` with `{"answer": "...", "sources": [...]}` |
//! | `GET`  | `/health` | Status, lifecycle phase and version |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "the document index is not ready yet" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_ready` (503), `upstream_timeout` (504),
//! `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser UIs can call
//! the API directly.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docqa_core::error::{EmbeddingError, GenerationError};
use docqa_core::models::ScoredChunk;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::chatbot::{Chatbot, PhaseName};
use crate::error::QueryError;

/// Build the API router around a shared chatbot.
pub fn router(chatbot: Arc<Chatbot>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(chatbot)
}

/// Serve the API on `bind` until the process is terminated.
///
/// The chatbot may still be indexing; queries answer `not_ready` until it
/// reaches the `Ready` phase.
pub async fn run_server(chatbot: Arc<Chatbot>, bind: &str) -> anyhow::Result<()> {
    let app = router(chatbot);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "docqa server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let (status, code) = match &err {
            QueryError::EmptyQuery => (StatusCode::BAD_REQUEST, "bad_request"),
            QueryError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            QueryError::Embedding(EmbeddingError::Timeout { .. })
            | QueryError::Generation(GenerationError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout")
            }
            QueryError::Embedding(EmbeddingError::DimensionMismatch { .. })
            | QueryError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            QueryError::Embedding(_) | QueryError::Generation(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
        };
        if status.is_server_error() {
            warn!(code, error = %err, "query failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    phase: PhaseName,
    version: &'static str,
}

async fn handle_health(State(chatbot): State<Arc<Chatbot>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        phase: chatbot.phase(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<ScoredChunk>,
}

async fn handle_query(
    State(chatbot): State<Arc<Chatbot>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let answer = chatbot.ask(&req.query).await?;
    Ok(Json(QueryResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}
