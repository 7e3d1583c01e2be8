//! HTTP request handlers.

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine as _;
use serde::Deserialize;

use super::AppState;
use crate::error::TallyError;
use crate::models::catalog::Catalog;
use crate::models::report::AggregateReport;
use crate::services::batch::ImageUpload;

/// Multipart field carrying the screenshots
pub const IMAGE_FIELD: &str = "images";

/// Body of `POST /upload/base64`
#[derive(Debug, Deserialize)]
pub struct Base64Upload {
    pub images: Vec<String>,
}

/// Tally the screenshots in a multipart upload.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AggregateReport>, TallyError> {
    let mut multipart = multipart.map_err(|e| upload_error(e.status(), e.body_text()))?;
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e.status(), e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("image-{}", images.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(e.status(), e.body_text()))?;

        // Browsers send an empty part when no file was picked
        if bytes.is_empty() {
            tracing::debug!("Ignoring empty part {}", name);
            continue;
        }

        images.push(ImageUpload::new(name, bytes));
    }

    let report = state.processor.process(images).await?;
    Ok(Json(report))
}

/// Tally base64-encoded screenshots sent as JSON.
pub async fn upload_base64(
    State(state): State<AppState>,
    body: Result<Json<Base64Upload>, JsonRejection>,
) -> Result<Json<AggregateReport>, TallyError> {
    let Json(body) = body.map_err(|e| upload_error(e.status(), e.body_text()))?;

    let images = body
        .images
        .iter()
        .enumerate()
        .map(|(i, encoded)| {
            let name = format!("image-{}", i + 1);
            decode_base64_image(encoded)
                .map(|bytes| ImageUpload::new(name.clone(), bytes))
                .map_err(|e| TallyError::InvalidUpload(format!("{}: {}", name, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = state.processor.process(images).await?;
    Ok(Json(report))
}

/// Body limit overruns are 413, every other unreadable body is 400
fn upload_error(status: StatusCode, message: String) -> TallyError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        TallyError::PayloadTooLarge(message)
    } else {
        TallyError::InvalidUpload(message)
    }
}

/// Decode plain base64 or a `data:image/...;base64,` URL
fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    base64::engine::general_purpose::STANDARD.decode(payload.trim())
}

/// The active loot catalog.
pub async fn catalog(State(state): State<AppState>) -> Json<Catalog> {
    Json(state.processor.catalog().as_ref().clone())
}

/// Health check, reporting whether the OCR backend is reachable.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.processor.engine();

    match engine.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "engine": engine.name() })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable", "engine": engine.name() })),
            )
        }
    }
}
