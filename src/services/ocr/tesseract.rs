use async_trait::async_trait;
use image::DynamicImage;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::engine::{encode_png, OcrEngine};
use crate::error::TallyError;
use crate::models::config::OcrConfig;

/// Tesseract OCR engine driving the `tesseract` command-line binary
///
/// The image is piped through stdin and the text read from stdout, so no
/// temporary files are needed. Each call spawns its own process.
pub struct TesseractEngine {
    binary: String,
    language: String,
    page_seg_mode: Option<u8>,
}

impl TesseractEngine {
    /// Create a new Tesseract engine instance
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
        }
    }

    /// Command-line arguments for one recognition run
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];

        if let Some(psm) = self.page_seg_mode {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }

        args
    }

    fn not_found(&self) -> TallyError {
        TallyError::EngineUnavailable(format!(
            "{} not found (install tesseract-ocr)",
            self.binary
        ))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, image: &DynamicImage, label: &str) -> Result<String, TallyError> {
        let img_bytes = encode_png(image, label)?;

        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => self.not_found(),
                _ => TallyError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&img_bytes).await?;
            // Closing stdin tells tesseract the image is complete
            drop(stdin);
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TallyError::Recognition {
                image: label.to_string(),
                reason: format!("tesseract failed ({}): {}", output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        tracing::debug!("tesseract recognized {} bytes of text from {}", text.len(), label);
        Ok(text)
    }

    async fn health_check(&self) -> Result<(), TallyError> {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => self.not_found(),
                _ => TallyError::Io(e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(TallyError::EngineUnavailable(format!(
                "{} --version exited with {}",
                self.binary, status
            )))
        }
    }
}
