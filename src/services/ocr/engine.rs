use async_trait::async_trait;
use image::DynamicImage;

use crate::error::TallyError;

/// OCR Engine trait - abstraction for different OCR implementations
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Recognize text from a preprocessed image
    ///
    /// `label` identifies the image in errors (usually the upload file name).
    async fn recognize(&self, image: &DynamicImage, label: &str) -> Result<String, TallyError>;

    /// Check if the OCR engine is usable right now
    async fn health_check(&self) -> Result<(), TallyError>;
}

/// Encode an image as PNG bytes for engines that take files or uploads
pub fn encode_png(image: &DynamicImage, label: &str) -> Result<Vec<u8>, TallyError> {
    let mut img_bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut img_bytes), image::ImageFormat::Png)
        .map_err(|e| TallyError::Recognition {
            image: label.to_string(),
            reason: format!("Failed to encode image: {}", e),
        })?;
    Ok(img_bytes)
}

/// In-memory engine for tests: answers by image width
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    #[derive(Default)]
    pub struct ScriptedEngine {
        texts: HashMap<u32, String>,
        failing: HashSet<u32>,
        slow: HashSet<u32>,
        unhealthy: bool,
    }

    impl ScriptedEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Images `width` pixels wide are recognized as `text`
        pub fn text(mut self, width: u32, text: &str) -> Self {
            self.texts.insert(width, text.to_string());
            self
        }

        pub fn failing(mut self, width: u32) -> Self {
            self.failing.insert(width);
            self
        }

        /// Images `width` pixels wide never finish recognizing
        pub fn slow(mut self, width: u32) -> Self {
            self.slow.insert(width);
            self
        }

        pub fn unhealthy(mut self) -> Self {
            self.unhealthy = true;
            self
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn recognize(&self, image: &DynamicImage, label: &str) -> Result<String, TallyError> {
            let width = image.width();

            if self.slow.contains(&width) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }

            if self.failing.contains(&width) {
                return Err(TallyError::Recognition {
                    image: label.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }

            Ok(self.texts.get(&width).cloned().unwrap_or_default())
        }

        async fn health_check(&self) -> Result<(), TallyError> {
            if self.unhealthy {
                Err(TallyError::EngineUnavailable("scripted outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// PNG bytes of a white image `width` pixels wide
    pub fn png_bytes(width: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 12, Rgb([255, 255, 255])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }
}
