pub mod engine;
pub mod http_ocr;
pub mod parser;
pub mod preprocessing;
pub mod tesseract;

use std::sync::Arc;

use crate::error::TallyError;
use crate::models::config::{OcrConfig, OcrEngineKind};

// Re-export main types
pub use engine::OcrEngine;
pub use http_ocr::HttpOcrClient;
pub use parser::{normalize_line, split_lines};
pub use preprocessing::PreprocessingService;
pub use tesseract::TesseractEngine;

/// Build the configured OCR backend
pub fn create_engine(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, TallyError> {
    let engine: Arc<dyn OcrEngine> = match config.engine {
        OcrEngineKind::Tesseract => Arc::new(TesseractEngine::new(config)),
        OcrEngineKind::Http => Arc::new(HttpOcrClient::new(config)?),
    };

    tracing::info!("Using {} OCR engine", engine.name());
    Ok(engine)
}
