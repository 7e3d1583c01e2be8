use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::engine::{encode_png, OcrEngine};
use crate::error::TallyError;
use crate::models::config::OcrConfig;

/// HTTP OCR client that talks to an external OCR server
#[derive(Clone)]
pub struct HttpOcrClient {
    client: reqwest::Client,
    base_url: String,
    min_box_score: f64,
}

#[derive(Serialize)]
struct ImageRequest {
    image_base64: String,
}

/// Single text box with bounding box coordinates
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box")]
    bbox: Vec<Vec<f64>>,  // 4 corner points [[x1,y1], [x2,y2], [x3,y3], [x4,y4]]
    text: String,
    score: f64,
}

/// OCR response from the server
#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    boxes: Vec<TextBox>,
    #[serde(default)]
    raw_text: String,
}

impl TextBox {
    /// Get bounding box as (x_min, y_min, x_max, y_max)
    fn get_bbox_rect(&self) -> (f64, f64, f64, f64) {
        let xs = self.bbox.iter().filter_map(|p| p.first().copied());
        let ys = self.bbox.iter().filter_map(|p| p.get(1).copied());

        let (x_min, x_max) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let (y_min, y_max) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));

        (x_min, y_min, x_max, y_max)
    }

    /// Boxes without usable corner points are dropped
    fn has_geometry(&self) -> bool {
        let (x_min, y_min, x_max, y_max) = self.get_bbox_rect();
        x_min.is_finite() && y_min.is_finite() && x_max.is_finite() && y_max.is_finite()
    }

    /// Compute IoU (Intersection over Union) with another box
    fn iou(&self, other: &TextBox) -> f64 {
        let (x1_min, y1_min, x1_max, y1_max) = self.get_bbox_rect();
        let (x2_min, y2_min, x2_max, y2_max) = other.get_bbox_rect();

        // Intersection
        let inter_x_min = x1_min.max(x2_min);
        let inter_y_min = y1_min.max(y2_min);
        let inter_x_max = x1_max.min(x2_max);
        let inter_y_max = y1_max.min(y2_max);

        if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
            return 0.0; // No overlap
        }

        let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);

        // Union
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 {
            return 0.0;
        }

        inter_area / union_area
    }

    /// Get leftmost x-coordinate (for left-to-right sorting)
    fn left_x(&self) -> f64 {
        self.get_bbox_rect().0
    }

    fn center_y(&self) -> f64 {
        let (_, y_min, _, y_max) = self.get_bbox_rect();
        (y_min + y_max) / 2.0
    }

    fn height(&self) -> f64 {
        let (_, y_min, _, y_max) = self.get_bbox_rect();
        y_max - y_min
    }

    /// Get box area
    fn area(&self) -> f64 {
        let (x_min, y_min, x_max, y_max) = self.get_bbox_rect();
        (x_max - x_min) * (y_max - y_min)
    }
}

/// Boxes sharing one text row
struct Row {
    center_y: f64,
    height: f64,
    boxes: Vec<TextBox>,
}

impl Row {
    fn accepts(&self, text_box: &TextBox) -> bool {
        (text_box.center_y() - self.center_y).abs() <= self.height / 2.0
    }
}

impl HttpOcrClient {
    /// Create a new HTTP OCR client
    pub fn new(config: &OcrConfig) -> Result<Self, TallyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| TallyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.http_url.trim_end_matches('/').to_string(),
            min_box_score: config.min_box_score,
        })
    }

    /// Apply NMS-like filtering to remove overlapping boxes
    /// Keep larger boxes when IoU > threshold
    fn filter_overlapping_boxes(boxes: Vec<TextBox>, iou_threshold: f64) -> Vec<TextBox> {
        let mut remaining = boxes;
        let mut filtered: Vec<TextBox> = Vec::with_capacity(remaining.len());

        // Largest first so the bigger of two overlapping boxes survives
        remaining.sort_by(|a, b| b.area().total_cmp(&a.area()));

        for candidate in remaining {
            if filtered.iter().all(|kept| kept.iou(&candidate) <= iou_threshold) {
                filtered.push(candidate);
            }
        }

        filtered
    }

    /// Process OCR boxes into text lines
    ///
    /// Low-confidence and overlapping boxes are dropped, the rest are grouped
    /// into rows by vertical centre (top to bottom) and each row is read left
    /// to right.
    fn boxes_to_text(&self, boxes: Vec<TextBox>) -> String {
        let confident: Vec<TextBox> = boxes
            .into_iter()
            .filter(|b| b.score >= self.min_box_score && b.has_geometry() && !b.text.trim().is_empty())
            .collect();

        // Step 1: Filter overlapping boxes (IoU > 0.3 = overlapping)
        let mut filtered = Self::filter_overlapping_boxes(confident, 0.3);

        // Step 2: Group into rows, top to bottom
        filtered.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

        let mut rows: Vec<Row> = Vec::new();
        for text_box in filtered {
            match rows.last_mut() {
                Some(row) if row.accepts(&text_box) => row.boxes.push(text_box),
                _ => rows.push(Row {
                    center_y: text_box.center_y(),
                    height: text_box.height(),
                    boxes: vec![text_box],
                }),
            }
        }

        // Step 3: Read each row left to right
        rows.into_iter()
            .map(|mut row| {
                row.boxes.sort_by(|a, b| a.left_x().total_cmp(&b.left_x()));
                row.boxes
                    .iter()
                    .map(|b| b.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Encode image to base64
    fn encode_image(image: &DynamicImage, label: &str) -> Result<String, TallyError> {
        let buffer = encode_png(image, label)?;
        Ok(general_purpose::STANDARD.encode(&buffer))
    }

    fn request_failed(label: &str, reason: String) -> TallyError {
        TallyError::Recognition {
            image: label.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrClient {
    fn name(&self) -> &'static str {
        "http"
    }

    /// Call the OCR endpoint and turn its boxes into lines of text
    async fn recognize(&self, image: &DynamicImage, label: &str) -> Result<String, TallyError> {
        let image_base64 = Self::encode_image(image, label)?;
        let url = format!("{}/ocr", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ImageRequest { image_base64 })
            .send()
            .await
            .map_err(|e| Self::request_failed(label, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Self::request_failed(
                label,
                format!("OCR server error ({}): {}", status, error_text),
            ));
        }

        let data: OcrResponse = response
            .json()
            .await
            .map_err(|e| Self::request_failed(label, format!("Failed to parse response: {}", e)))?;

        if data.boxes.is_empty() {
            return Ok(data.raw_text);
        }

        Ok(self.boxes_to_text(data.boxes))
    }

    /// Check if server is healthy
    async fn health_check(&self) -> Result<(), TallyError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TallyError::EngineUnavailable(format!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(TallyError::EngineUnavailable(format!(
                "Health check returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
