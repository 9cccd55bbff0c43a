//! # api
//!
//! Operator-facing HTTP API (spec.md §6, SPEC_FULL.md §4.8): DOUT1 status and
//! manual override, and command queue inspection/update. Router built the
//! same way the teacher assembles its own `Router::new().route(...)` chain
//! in `main.rs`, with a permissive `tower-http` CORS layer since this is an
//! internal operator tool, not a multi-tenant surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::repository::{CommandStatus, Repository};

static STARTUP_MS: AtomicU64 = AtomicU64::new(0);

pub fn router(repo: Arc<dyn Repository>) -> Router {
    STARTUP_MS.store(now_ms(), Ordering::Relaxed);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/dout1_status/:imei", get(dout1_status))
        .route("/dout1_control/:imei", post(dout1_control))
        .route("/command_queue/:imei", get(command_queue))
        .route("/command_queue/update/:id", post(command_queue_update))
        .layer(cors)
        .with_state(repo)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn format_timestamp(t: i64) -> String {
    Utc.timestamp_opt(t, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

async fn health() -> Json<serde_json::Value> {
    let startup = STARTUP_MS.load(Ordering::Relaxed);
    let uptime_secs = if startup > 0 { (now_ms() - startup) / 1000 } else { 0 };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": uptime_secs,
    }))
}

#[derive(Serialize)]
struct Dout1StatusResponse {
    imei: String,
    dout1_active: bool,
    deactivate_time: Option<String>,
}

async fn dout1_status(
    State(repo): State<Arc<dyn Repository>>,
    Path(imei): Path<String>,
) -> Result<Json<Dout1StatusResponse>, StatusCode> {
    let state = repo
        .get_dout1_state(&imei)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(Dout1StatusResponse {
        imei,
        dout1_active: state.active,
        deactivate_time: state.deactivate_time.map(format_timestamp),
    }))
}

#[derive(Deserialize)]
struct Dout1ControlRequest {
    activate: bool,
}

#[derive(Serialize)]
struct Dout1ControlResponse {
    command: String,
    status: &'static str,
}

async fn dout1_control(
    State(repo): State<Arc<dyn Repository>>,
    Path(imei): Path<String>,
    Json(body): Json<Dout1ControlRequest>,
) -> Result<Json<Dout1ControlResponse>, StatusCode> {
    if !repo
        .device_known(&imei)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    {
        return Err(StatusCode::NOT_FOUND);
    }

    let command = if body.activate { "setdigout 1" } else { "setdigout 0" };
    repo.enqueue_command(&imei, command)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(Dout1ControlResponse {
        command: command.to_string(),
        status: "queued",
    }))
}

#[derive(Serialize)]
struct CommandQueueItem {
    id: i64,
    command: String,
}

#[derive(Serialize)]
struct CommandQueueResponse {
    commands: Vec<CommandQueueItem>,
}

async fn command_queue(
    State(repo): State<Arc<dyn Repository>>,
    Path(imei): Path<String>,
) -> Result<Json<CommandQueueResponse>, StatusCode> {
    let pending = repo
        .list_pending_commands(&imei)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(CommandQueueResponse {
        commands: pending
            .into_iter()
            .map(|c| CommandQueueItem { id: c.id, command: c.command })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct CommandQueueUpdateRequest {
    status: String,
}

async fn command_queue_update(
    State(repo): State<Arc<dyn Repository>>,
    Path(id): Path<i64>,
    Json(body): Json<CommandQueueUpdateRequest>,
) -> Result<StatusCode, StatusCode> {
    let status = CommandStatus::from_str(&body.status).ok_or(StatusCode::BAD_REQUEST)?;
    repo.mark_command(id, status)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::OK)
}
