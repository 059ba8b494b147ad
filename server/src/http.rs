//! Operator HTTP API
//!
//! - `POST /api/vehicles/{id}/commands` issues start / stop / switch_camera
//! - `GET  /api/vehicles` fleet overview
//! - `GET  /api/vehicles/{id}/stream` authoritative stream status
//! - `GET  /api/vehicles/{id}/connection` connection health
//! - `GET  /api/vehicles/{id}/diagnostics` full snapshot for support
//!
//! Command rejections map to 4xx/503 with a JSON `{ "error": ... }` body.

use crate::command::CommandDispatcher;
use crate::diagnostics::{ConnectionView, DiagnosticsReporter, DiagnosticsSnapshot, FleetEntry};
use crate::error::{CommandError, StoreError};
use crate::model::{PendingCommand, StreamStatus};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use racecast_shared::{now_ms, CommandKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    pub diagnostics: Arc<DiagnosticsReporter>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: CommandKind,
    #[serde(default)]
    pub camera: Option<String>,
}

#[derive(Debug, Serialize)]
struct StreamView {
    #[serde(flatten)]
    stream: StreamStatus,
    is_live: bool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/vehicles", get(get_fleet))
        .route("/api/vehicles/{id}/commands", post(post_command))
        .route("/api/vehicles/{id}/stream", get(get_stream))
        .route("/api/vehicles/{id}/connection", get(get_connection))
        .route("/api/vehicles/{id}/diagnostics", get(get_diagnostics))
        .with_state(state)
}

async fn post_command(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<(StatusCode, Json<PendingCommand>), ApiError> {
    let cmd = app.dispatcher.issue(&id, req.command, req.camera).await?;
    Ok((StatusCode::ACCEPTED, Json(cmd)))
}

async fn get_fleet(State(app): State<AppState>) -> Result<Json<Vec<FleetEntry>>, ApiError> {
    Ok(Json(app.diagnostics.fleet(now_ms()).await?))
}

async fn get_stream(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamView>, ApiError> {
    let stream = app.diagnostics.stream(&id).await?;
    Ok(Json(StreamView {
        is_live: stream.is_live(),
        stream,
    }))
}

async fn get_connection(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionView>, ApiError> {
    Ok(Json(app.diagnostics.connection(&id, now_ms()).await?))
}

async fn get_diagnostics(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DiagnosticsSnapshot>, ApiError> {
    Ok(Json(app.diagnostics.snapshot(&id, now_ms()).await?))
}

/// HTTP view of a failed request
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        let status = match err {
            CommandError::Store(e) => return e.into(),
            CommandError::DeviceOffline(_) => StatusCode::SERVICE_UNAVAILABLE,
            CommandError::CommandInFlight { .. } | CommandError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            CommandError::CameraUnavailable { .. }
            | CommandError::MissingCamera(_)
            | CommandError::DestinationNotConfigured(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!("store failure while serving request: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
