//! HTTP handlers.
//!
//! Every request that changes the drawing goes through the core's
//! validation and repair; the stored document is always a valid one.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gridsketch_core::document::{default_entity_color, now_timestamp};
use gridsketch_core::{Command, Document, Storage};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

type ApiResult = Result<Json<Value>, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    let exports = ServeDir::new(&state.exports_dir);
    let saves = ServeDir::new(state.saves.base_path());
    Router::new()
        .route("/api", get(api_help))
        .route("/health", get(health))
        .route("/api/editor/data", get(get_editor_data).post(set_editor_data))
        .route("/api/editor/save", post(save_drawing))
        .route("/api/editor/load/{filename}", get(load_drawing))
        .route("/api/chatbot/canvas-state", get(canvas_state))
        .route("/api/chatbot/update-canvas", post(update_canvas))
        .route("/api/canvas/export", post(export_canvas))
        .route("/api/canvas/extents", post(export_extents))
        .nest_service("/exports", exports)
        .nest_service("/saves", saves)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn now_millis() -> i128 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

/// `GET /api` — endpoint reference.
pub async fn api_help() -> Json<Value> {
    Json(json!({
        "name": "GridSketch Drawing API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document store, canvas export and automation endpoints for the GridSketch editor",
        "endpoints": {
            "help": { "method": "GET", "path": "/api", "description": "This endpoint reference" },
            "health": { "method": "GET", "path": "/health", "description": "Liveness probe" },
            "canvas": {
                "export": {
                    "method": "POST",
                    "path": "/api/canvas/export",
                    "description": "Store a PNG of the full canvas",
                    "body": {
                        "imageData": "base64 encoded PNG, optionally as a data URL",
                        "bounds": "{ x, y, width, height }",
                        "metadata": "optional metadata object"
                    }
                },
                "extents": {
                    "method": "POST",
                    "path": "/api/canvas/extents",
                    "description": "Store a PNG of a canvas area; without an area the drawing bounds are used",
                    "body": {
                        "imageData": "base64 encoded PNG, optionally as a data URL",
                        "x": "left", "y": "top", "width": "area width", "height": "area height",
                        "metadata": "optional metadata object"
                    }
                }
            },
            "editor": {
                "getData": { "method": "GET", "path": "/api/editor/data", "description": "Current drawing document" },
                "setData": {
                    "method": "POST",
                    "path": "/api/editor/data",
                    "description": "Replace document fields; missing fields keep their stored values",
                    "body": { "entities": "array", "constraints": "array", "metadata": "object" }
                },
                "save": {
                    "method": "POST",
                    "path": "/api/editor/save",
                    "description": "Save a drawing to a JSON file",
                    "body": { "data": "drawing document", "filename": "optional file name" }
                },
                "load": { "method": "GET", "path": "/api/editor/load/{filename}", "description": "Load a saved drawing" }
            },
            "chatbot": {
                "getState": { "method": "GET", "path": "/api/chatbot/canvas-state", "description": "Entities, constraints and metadata" },
                "updateCanvas": {
                    "method": "POST",
                    "path": "/api/chatbot/update-canvas",
                    "description": "Apply an automation command",
                    "body": {
                        "action": "add_entity | remove_entity | update_entity | add_constraint | clear_canvas",
                        "data": "action-specific object"
                    },
                    "examples": {
                        "add_entity": { "action": "add_entity", "data": { "entity": "{ type, ...geometry }" } },
                        "remove_entity": { "action": "remove_entity", "data": { "entityId": "entity_1" } },
                        "update_entity": { "action": "update_entity", "data": { "entityId": "entity_1", "updates": "{ ...fields }" } }
                    }
                }
            }
        },
        "entityTypes": ["line", "polyline", "rectangle", "circle", "arc"],
        "staticRoutes": {
            "exports": "/exports/{filename} - exported PNG files",
            "saves": "/saves/{filename} - saved JSON drawings"
        }
    }))
}

pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/editor/data`
pub async fn get_editor_data(State(state): State<Arc<AppState>>) -> Json<Value> {
    let live = state.document.read().await;
    Json(json!({ "success": true, "data": live.document, "timestamp": now_timestamp() }))
}

/// `POST /api/editor/data` — merge top-level fields into the stored document.
pub async fn set_editor_data(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> ApiResult {
    let Value::Object(fields) = body else {
        return Err(ApiError::bad_request("Invalid document", "body must be a JSON object"));
    };
    let mut live = state.document.write().await;
    let mut merged = live
        .document
        .to_value()
        .map_err(|e| ApiError::internal("Failed to read editor data", e))?;
    if let Some(root) = merged.as_object_mut() {
        for (key, value) in fields {
            if !value.is_null() {
                root.insert(key, value);
            }
        }
    }
    let (mut document, report) = Document::from_value(merged, default_entity_color())?;
    document.timestamp = now_timestamp();
    if !report.is_clean() {
        info!("repaired posted document: {report:?}");
    }
    live.replace(document);
    Ok(Json(json!({
        "success": true,
        "message": "Editor data updated successfully",
        "data": live.document,
    })))
}

/// `GET /api/chatbot/canvas-state`
pub async fn canvas_state(State(state): State<Arc<AppState>>) -> Json<Value> {
    let live = state.document.read().await;
    Json(json!({
        "success": true,
        "canvas": {
            "entities": live.document.entities,
            "constraints": live.document.constraints,
            "metadata": live.document.metadata,
        },
        "timestamp": now_timestamp(),
    }))
}

/// `POST /api/chatbot/update-canvas`
pub async fn update_canvas(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> ApiResult {
    let command = Command::from_value(body)?;
    let action = command.action();
    let resets_ids = matches!(command, Command::ClearCanvas);
    let mut live = state.document.write().await;
    let outcome = command.apply(&live.document, default_entity_color(), live.next_entity)?;
    let mut document = outcome.document;
    document.timestamp = now_timestamp();
    live.replace(document);
    if resets_ids {
        live.reset_ids();
    }
    info!("applied {action}");
    Ok(Json(json!({
        "success": true,
        "action": action,
        "result": outcome.result,
        "timestamp": now_timestamp(),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub image_data: Option<String>,
    pub bounds: Option<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtentsRequest {
    pub image_data: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub metadata: Option<Value>,
}

/// Decoded PNG bytes and their pixel size.
struct PngImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

fn decode_png(image_data: Option<&str>) -> Result<PngImage, ApiError> {
    let image_data = image_data
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image data provided", "imageData is required"))?;
    let encoded = image_data.strip_prefix(PNG_DATA_URL_PREFIX).unwrap_or(image_data);
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::bad_request("Invalid image data", e))?;
    let (width, height) = {
        let reader = png::Decoder::new(Cursor::new(bytes.as_slice()))
            .read_info()
            .map_err(|e| ApiError::bad_request("Invalid PNG", e))?;
        let info = reader.info();
        (info.width, info.height)
    };
    Ok(PngImage { bytes, width, height })
}

/// Write an export under a fresh `<prefix>_<millis>.png` name.
async fn write_export(state: &AppState, prefix: &str, image: &PngImage) -> Result<String, ApiError> {
    let mut filename = format!("{prefix}_{}.png", now_millis());
    if state.exports_dir.join(&filename).exists() {
        filename = format!("{prefix}_{}_{}.png", now_millis(), Uuid::new_v4().simple());
    }
    tokio::fs::write(state.exports_dir.join(&filename), &image.bytes)
        .await
        .map_err(|e| ApiError::internal("Failed to export canvas", e))?;
    info!("exported {filename} ({}x{})", image.width, image.height);
    Ok(filename)
}

/// `POST /api/canvas/export`
pub async fn export_canvas(State(state): State<Arc<AppState>>, Json(request): Json<ExportRequest>) -> ApiResult {
    let image = decode_png(request.image_data.as_deref())?;
    let filename = write_export(&state, "canvas_export", &image).await?;
    Ok(Json(json!({
        "success": true,
        "path": format!("/exports/{filename}"),
        "filename": filename,
        "bounds": request.bounds,
        "image": { "width": image.width, "height": image.height },
        "metadata": request.metadata.unwrap_or_else(|| json!({})),
        "timestamp": now_timestamp(),
    })))
}

/// Pixel rectangle covering the stored drawing, if it has any entities.
fn drawing_extents(document: &Document) -> Option<Value> {
    let (min, max) = document.to_model().bounds()?;
    let grid = document.grid();
    let top_left = grid.denormalize(min);
    let bottom_right = grid.denormalize(max);
    Some(json!({
        "x": top_left.x,
        "y": top_left.y,
        "width": bottom_right.x - top_left.x,
        "height": bottom_right.y - top_left.y,
    }))
}

/// `POST /api/canvas/extents`
pub async fn export_extents(State(state): State<Arc<AppState>>, Json(request): Json<ExtentsRequest>) -> ApiResult {
    let image = decode_png(request.image_data.as_deref())?;
    let extents = match (request.x, request.y, request.width, request.height) {
        (None, None, None, None) => drawing_extents(&state.document.read().await.document),
        (x, y, width, height) => Some(json!({ "x": x, "y": y, "width": width, "height": height })),
    };
    let filename = write_export(&state, "canvas_extents", &image).await?;
    Ok(Json(json!({
        "success": true,
        "path": format!("/exports/{filename}"),
        "filename": filename,
        "extents": extents,
        "image": { "width": image.width, "height": image.height },
        "metadata": request.metadata.unwrap_or_else(|| json!({})),
        "timestamp": now_timestamp(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub data: Value,
    pub filename: Option<String>,
}

/// `POST /api/editor/save`
pub async fn save_drawing(State(state): State<Arc<AppState>>, Json(request): Json<SaveRequest>) -> ApiResult {
    let (document, _) = Document::from_value(request.data, default_entity_color())?;
    let id = request
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("drawing_{}", now_millis()));
    state.saves.save(&id, &document).await?;
    let filename = gridsketch_core::FileStorage::file_name(&id);
    info!("saved drawing {filename}");
    Ok(Json(json!({
        "success": true,
        "path": format!("/saves/{filename}"),
        "filename": filename,
        "timestamp": now_timestamp(),
    })))
}

/// `GET /api/editor/load/{filename}`
pub async fn load_drawing(State(state): State<Arc<AppState>>, Path(filename): Path<String>) -> ApiResult {
    let document = state.saves.load(&filename).await?;
    Ok(Json(json!({
        "success": true,
        "data": document,
        "filename": gridsketch_core::FileStorage::file_name(&filename),
        "timestamp": now_timestamp(),
    })))
}
