//! HTTP surface: `POST /extract`, `GET /health` and a root banner.

use crate::extract::Extractor;
use crate::model::ExtractionRequest;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use url::Url;

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    details: String,
}

fn error_response(status: StatusCode, error: &str, details: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            details: details.into(),
        }),
    )
        .into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/extract", post(extract))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "Harvester document extraction service",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid request", rejection.body_text());
        }
    };
    if let Err(details) = check_request(&request) {
        return error_response(StatusCode::BAD_REQUEST, "invalid request", details);
    }

    let extractor = state.extractor.clone();
    match tokio::spawn(async move { extractor.run(&request).await }).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            error!("Extraction task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "extraction failed", e.to_string())
        }
    }
}

/// Reject requests the pipeline cannot act on.
pub fn check_request(request: &ExtractionRequest) -> Result<(), String> {
    let url = Url::parse(&request.target_url)
        .map_err(|e| format!("url {:?} is not a valid URL: {}", request.target_url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("url must use http or https, got {}", url.scheme()));
    }
    if request.storage_bucket.trim().is_empty() {
        return Err("s3_bucket must not be empty".to_string());
    }
    if request.storage_prefix.trim().is_empty() {
        return Err("s3_prefix must not be empty".to_string());
    }
    Ok(())
}
