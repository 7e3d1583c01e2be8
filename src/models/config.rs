use serde::{Deserialize, Serialize};
use crate::models::catalog::CatalogEntry;

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

/// OCR backend choice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// Local `tesseract` binary
    Tesseract,
    /// Remote OCR server speaking the `/ocr` JSON protocol
    Http,
}

impl Default for OcrEngineKind {
    fn default() -> Self {
        Self::Tesseract
    }
}

/// Text recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: OcrEngineKind,
    pub language: String,
    pub tesseract_path: String,
    pub page_seg_mode: Option<u8>,
    pub http_url: String,
    pub http_timeout_secs: u64,
    /// Boxes returned by the OCR server below this confidence are ignored
    pub min_box_score: f64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            language: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            page_seg_mode: None,
            http_url: "http://127.0.0.1:39835".to_string(),
            http_timeout_secs: 30,
            min_box_score: 0.5,
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub scale_x: f64,
    pub scale_y: f64,
    /// Contrast in (-1, 1); 0 leaves the image unchanged
    pub contrast: f32,
    /// Luma above this becomes white, everything else black
    pub threshold: u8,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            scale_x: 1.23,
            scale_y: 1.5,
            contrast: 0.69,
            threshold: 128,
        }
    }
}

/// Fuzzy matching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum accepted dissimilarity (0.0 = exact, 1.0 = anything)
    pub threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

/// What to do when some images in a batch cannot be recognized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed image fails the whole request
    FailBatch,
    /// Failed images are dropped and the rest are aggregated
    SkipFailed,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::FailBatch
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub image_timeout_secs: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            image_timeout_secs: 60,
            failure_policy: FailurePolicy::FailBatch,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Text
    }
}

/// Logging configuration (`RUST_LOG` takes precedence over `filter`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "loot_tally_lib=info,loot_tally=info,tower_http=info".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub preprocessing: PreprocessingConfig,
    pub matching: MatchingConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
    /// Empty means the built-in loot table
    pub catalog: Vec<CatalogEntry>,
}

impl AppConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }

        if self.server.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes must be non-zero".to_string());
        }

        let p = &self.preprocessing;
        if !(p.scale_x > 0.0 && p.scale_y > 0.0) {
            return Err(format!(
                "preprocessing scale must be positive, got {}x{}",
                p.scale_x, p.scale_y
            ));
        }

        if !(p.contrast > -1.0 && p.contrast < 1.0) {
            return Err(format!(
                "preprocessing.contrast must be in (-1, 1), got {}",
                p.contrast
            ));
        }

        if !(0.0..=1.0).contains(&self.matching.threshold) {
            return Err(format!(
                "matching.threshold must be in [0, 1], got {}",
                self.matching.threshold
            ));
        }

        if self.batch.image_timeout_secs == 0 {
            return Err("batch.image_timeout_secs must be non-zero".to_string());
        }

        if self.ocr.language.trim().is_empty() {
            return Err("ocr.language must not be empty".to_string());
        }

        if self.ocr.engine == OcrEngineKind::Http && self.ocr.http_timeout_secs == 0 {
            return Err("ocr.http_timeout_secs must be non-zero".to_string());
        }

        Ok(())
    }
}
