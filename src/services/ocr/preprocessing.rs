use image::{DynamicImage, GenericImageView, ImageBuffer, Luma};
use crate::models::config::PreprocessingConfig;

/// Image preprocessing service for OCR optimization
pub struct PreprocessingService {
    config: PreprocessingConfig,
}

impl PreprocessingService {
    /// Create a new preprocessing service with custom configuration
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    /// Full preprocessing pipeline: scale → contrast → grayscale → threshold
    pub fn preprocess(&self, image: &DynamicImage) -> DynamicImage {
        let scaled = self.scale(image, self.config.scale_x, self.config.scale_y);
        let contrasted = self.adjust_contrast(&scaled, self.config.contrast);
        let gray = self.to_grayscale(&contrasted);
        self.threshold(&gray, self.config.threshold)
    }

    /// Decode uploaded bytes and run the full pipeline
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<DynamicImage, String> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| format!("Failed to load image: {}", e))?;

        Ok(self.preprocess(&image))
    }

    /// Scale image independently along each axis
    pub fn scale(&self, image: &DynamicImage, factor_x: f64, factor_y: f64) -> DynamicImage {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = scaled_dimensions(width, height, factor_x, factor_y);

        if (new_width, new_height) == (width, height) {
            return image.clone();
        }

        image.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
    }

    /// Stretch each colour channel away from mid-gray
    ///
    /// `amount` is in (-1, 1). Positive values increase contrast, negative
    /// values flatten the image.
    pub fn adjust_contrast(&self, image: &DynamicImage, amount: f32) -> DynamicImage {
        if amount == 0.0 {
            return image.clone();
        }

        let factor = (1.0 + amount) / (1.0 - amount);
        let adjust = |v: u8| -> u8 { ((v as f32 - 127.5) * factor + 127.5).clamp(0.0, 255.0) as u8 };

        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            pixel[0] = adjust(pixel[0]);
            pixel[1] = adjust(pixel[1]);
            pixel[2] = adjust(pixel[2]);
        }

        DynamicImage::ImageRgba8(rgba)
    }

    /// Convert image to grayscale
    pub fn to_grayscale(&self, image: &DynamicImage) -> DynamicImage {
        DynamicImage::ImageLuma8(image.to_luma8())
    }

    /// Apply a fixed binary threshold
    pub fn threshold(&self, image: &DynamicImage, level: u8) -> DynamicImage {
        let gray_img = image.to_luma8();

        let binary = ImageBuffer::from_fn(gray_img.width(), gray_img.height(), |x, y| {
            let pixel = gray_img.get_pixel(x, y);
            if pixel[0] > level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        DynamicImage::ImageLuma8(binary)
    }
}

impl Default for PreprocessingService {
    fn default() -> Self {
        Self::new(PreprocessingConfig::default())
    }
}

/// Rounded size after scaling, never below 1 px
fn scaled_dimensions(width: u32, height: u32, factor_x: f64, factor_y: f64) -> (u32, u32) {
    let new_width = (width as f64 * factor_x).round().max(1.0) as u32;
    let new_height = (height as f64 * factor_y).round().max(1.0) as u32;
    (new_width, new_height)
}
