use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Body returned for every server-side failure. Details go to the log only.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error performing OCR";

/// Errors produced while tallying an upload batch
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("No files uploaded")]
    NoImages,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Failed to decode image '{image}': {reason}")]
    ImageDecode { image: String, reason: String },

    #[error("Text recognition failed for '{image}': {reason}")]
    Recognition { image: String, reason: String },

    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Recognition of '{image}' timed out after {secs}s")]
    Timeout { image: String, secs: u64 },

    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TallyError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            TallyError::NoImages | TallyError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            TallyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for TallyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.is_client_error() {
            tracing::warn!("Rejected upload: {}", self);
            self.to_string()
        } else {
            tracing::error!("Upload failed: {}", self);
            GENERIC_FAILURE_MESSAGE.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
