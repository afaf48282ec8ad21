//! HTTP front-end.
//!
//! A thin axum layer over [`SyncService`]: submit pull jobs, poll job
//! state, list configured layers, report service status.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::service::SyncService;

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub layer: String,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
struct LayerSummary {
    name: String,
    source_layer: String,
    target_schema: String,
    target_table: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(service: Arc<SyncService>) -> Router {
    Router::new()
        .route("/api/pull", post(submit_job))
        .route("/api/jobs/:id", get(get_job))
        .route("/api/layers", get(list_layers))
        .route("/api/status", get(get_status))
        .with_state(service)
}

async fn submit_job(
    State(service): State<Arc<SyncService>>,
    Json(request): Json<PullRequest>,
) -> Response {
    match service.submit(&request.layer, request.filter) {
        Ok(job) => (StatusCode::ACCEPTED, Json(job)).into_response(),
        Err(error) => {
            let status = match error {
                Error::UnknownLayer(_) => StatusCode::BAD_REQUEST,
                Error::QueueFull | Error::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, error.to_string())
        }
    }
}

async fn get_job(State(service): State<Arc<SyncService>>, Path(id): Path<String>) -> Response {
    match service.lookup(&id) {
        Some(job) => Json(job).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("no job with id \"{id}\"")),
    }
}

async fn list_layers(State(service): State<Arc<SyncService>>) -> Response {
    let layers: Vec<LayerSummary> = service
        .config()
        .layers
        .iter()
        .map(|layer| LayerSummary {
            name: layer.name.clone(),
            source_layer: layer.source_layer.clone(),
            target_schema: layer.target_schema.clone(),
            target_table: layer.target_table.clone(),
        })
        .collect();
    Json(layers).into_response()
}

async fn get_status(State(service): State<Arc<SyncService>>) -> Response {
    Json(service.status()).into_response()
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}
