//! HTTP API for the search service.
//!
//! A small JSON API over the index and merger:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/search?q=...&top_k=10` | Rewrite, fan out, merge, rank |
//! | `POST` | `/reindex` | Replace the corpus from a JSON item array |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a message:
//!
//! ```json
//! { "error": { "code": "timeout", "message": "search timed out after 20s" } }
//! ```
//!
//! Codes: `timeout` (408), `internal` (500).
//!
//! # Deadlines
//!
//! Each request wraps its index work in a deadline (`search_timeout_secs`
//! / `reindex_timeout_secs`). A reindex cut off by its deadline leaves the
//! previous corpus serving, same as an embedding failure.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::index::{HybridIndex, ScoredResult};
use crate::merge::merged_search;
use crate::models::{Item, Rewrite};
use crate::rewrite::QueryRewriter;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: Arc<HybridIndex>,
    rewriter: Arc<dyn QueryRewriter>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and serves until the
/// process is terminated. The index and rewriter are injected by the
/// caller; the server owns no search state of its own.
pub async fn run_server(
    config: Arc<Config>,
    index: Arc<HybridIndex>,
    rewriter: Arc<dyn QueryRewriter>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config,
        index,
        rewriter,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/search", get(handle_search))
        .route("/reindex", post(handle_reindex))
        .layer(cors)
        .with_state(state);

    tracing::info!(addr = %bind_addr, "search service listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
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

/// Constructs a 408 Request Timeout error.
fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal error.
fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /search ============

/// Query parameters for `GET /search`.
#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    /// Result cap. Omitted → configured default; zero or negative → no cap.
    top_k: Option<i64>,
}

/// JSON response body for `GET /search`.
#[derive(Serialize)]
struct SearchResponse {
    query: String,
    normalized: Rewrite,
    results: Vec<ScoredResult>,
}

/// Handler for `GET /search`.
///
/// Rewrites the raw query (falling back to the raw text when the rewriter
/// fails), searches every variant, and returns the merged ranking. An
/// empty query yields an empty result list, not an error.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let raw = params.q;
    let limit = match params.top_k {
        None => state.config.search.default_top_k,
        Some(k) if k <= 0 => 0,
        Some(k) => k as usize,
    };

    let deadline = Duration::from_secs(state.config.search.search_timeout_secs);
    let outcome = tokio::time::timeout(deadline, async {
        let rewrite = match state.rewriter.rewrite(&raw).await {
            Ok(rewrite) => rewrite,
            Err(err) => {
                tracing::debug!(error = %err, "rewriter unavailable, using raw query");
                Rewrite::passthrough(&raw)
            }
        };
        let results = merged_search(&state.index, &rewrite, limit).await?;
        Ok::<_, anyhow::Error>((rewrite, results))
    })
    .await;

    match outcome {
        Err(_) => Err(timeout_error(format!(
            "search timed out after {}s",
            state.config.search.search_timeout_secs
        ))),
        Ok(Err(err)) => Err(internal_error(format!("search failed: {err:#}"))),
        Ok(Ok((normalized, results))) => Ok(Json(SearchResponse {
            query: raw,
            normalized,
            results,
        })),
    }
}

// ============ POST /reindex ============

/// Handler for `POST /reindex`.
///
/// Accepts a JSON array of items and rebuilds the corpus from it. Returns
/// `204 No Content` on success. On failure or deadline the previous corpus
/// keeps serving and the error names the failing item.
async fn handle_reindex(
    State(state): State<AppState>,
    Json(items): Json<Vec<Item>>,
) -> Result<StatusCode, AppError> {
    let deadline = Duration::from_secs(state.config.search.reindex_timeout_secs);

    match tokio::time::timeout(deadline, state.index.rebuild(&items)).await {
        Err(_) => Err(timeout_error(format!(
            "reindex timed out after {}s",
            state.config.search.reindex_timeout_secs
        ))),
        Ok(Err(err)) => Err(internal_error(format!("reindex failed: {err:#}"))),
        Ok(Ok(indexed)) => {
            tracing::info!(indexed, received = items.len(), "reindex complete");
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
