//! HTTP/JSON API over the [`Controller`].
//!
//! | Method | Path          | |
//! |--------|---------------|--|
//! | GET    | `/health`     | liveness |
//! | GET    | `/state`      | last reading and pump state |
//! | GET    | `/thresholds` | current thresholds |
//! | PUT    | `/thresholds` | replace thresholds wholesale |
//! | POST   | `/pump`       | manual pump command `{"on": bool}` |
//! | GET    | `/logs`       | buffered activity log, oldest first |

use crate::device::{Controller, DeviceState, LogEntry, PumpRequestResult, ThresholdConfig};
use crate::error::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

type SharedController = Arc<Controller>;

#[derive(Debug, Deserialize)]
struct PumpRequest {
    on: bool,
}

/// Build the API router.
pub fn router(controller: SharedController) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(device_state))
        .route("/thresholds", get(get_thresholds).put(put_thresholds))
        .route("/pump", post(pump))
        .route("/logs", get(logs))
        .with_state(controller)
}

/// Bind `address` and serve the API until the task is aborted.
pub async fn serve(address: &str, controller: SharedController) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("[API] Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(controller)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn device_state(State(controller): State<SharedController>) -> Json<DeviceState> {
    Json(controller.device_state())
}

async fn get_thresholds(State(controller): State<SharedController>) -> Json<ThresholdConfig> {
    Json(controller.thresholds())
}

async fn put_thresholds(
    State(controller): State<SharedController>,
    Json(thresholds): Json<ThresholdConfig>,
) -> std::result::Result<Json<ThresholdConfig>, (StatusCode, Json<Value>)> {
    match controller.set_thresholds(thresholds) {
        Ok(()) => {
            info!("[API] Thresholds replaced");
            Ok(Json(controller.thresholds()))
        }
        Err(e) => {
            warn!("[API] Rejected thresholds: {}", e);
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

async fn pump(
    State(controller): State<SharedController>,
    Json(request): Json<PumpRequest>,
) -> Json<PumpRequestResult> {
    Json(controller.request_pump(request.on))
}

async fn logs(State(controller): State<SharedController>) -> Json<Vec<LogEntry>> {
    Json(controller.activity())
}
