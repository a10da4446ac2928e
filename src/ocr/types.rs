//! OCR Types
//!
//! Defines recognition results, preprocessing options and OCR errors.

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Tesseract OCR (local CLI)
    #[default]
    Tesseract,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl std::str::FromStr for OcrProvider {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "ollama" => Ok(Self::Ollama),
            other => Err(OcrError::ProviderNotAvailable(format!(
                "unknown OCR provider '{}'",
                other
            ))),
        }
    }
}

/// Pixel-based rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// OCR result, confidence already normalized to 0-100
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    /// Recognized text
    pub text: String,
    /// Confidence score (0-100)
    pub confidence: f64,
    /// Language the engine was initialized with
    pub language: String,
    /// Provider used
    pub provider: OcrProvider,
    /// Individual word results, best effort and possibly empty
    pub words: Vec<OcrWord>,
}

/// Single word OCR result
#[derive(Debug, Clone, Serialize)]
pub struct OcrWord {
    /// Word text
    pub text: String,
    /// Confidence for this word (0-100)
    pub confidence: f64,
    /// Bounding box in pixels of the recognized image
    pub bbox: PixelRect,
}

/// Image adjustments applied before recognition. Unset fields are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// -100..=100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
    /// -100..=100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<i32>,
    /// Clockwise rotation in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<PixelRect>,
}

impl ProcessingOptions {
    /// Whether applying these options would change the image
    pub fn is_noop(&self) -> bool {
        self.brightness.unwrap_or(0) == 0
            && self.contrast.unwrap_or(0) == 0
            && self.rotation.map_or(true, |r| r.rem_euclid(360.0) == 0.0)
            && self.crop.is_none()
    }

    /// Check ranges before any work starts
    pub fn validate(&self) -> Result<(), OcrError> {
        if let Some(brightness) = self.brightness {
            if !(-100..=100).contains(&brightness) {
                return Err(OcrError::InvalidOptions(format!(
                    "brightness must be within -100..=100, got {}",
                    brightness
                )));
            }
        }
        if let Some(contrast) = self.contrast {
            if !(-100..=100).contains(&contrast) {
                return Err(OcrError::InvalidOptions(format!(
                    "contrast must be within -100..=100, got {}",
                    contrast
                )));
            }
        }
        if let Some(rotation) = self.rotation {
            if !rotation.is_finite() {
                return Err(OcrError::InvalidOptions("rotation must be finite".to_string()));
            }
        }
        if let Some(crop) = &self.crop {
            if crop.width == 0 || crop.height == 0 {
                return Err(OcrError::InvalidOptions(
                    "crop width and height must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// OCR error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("OCR engine initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),

    #[error("OCR engine has been terminated")]
    EngineTerminated,

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("Malformed engine result: {0}")]
    MalformedResult(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Recognition cancelled: {0}")]
    Cancelled(String),

    #[error("OCR timed out after {0} seconds")]
    Timeout(u64),
}

impl OcrError {
    /// Errors that no retry on another page can fix
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotAvailable(_)
                | Self::InitializationFailed(_)
                | Self::InvalidLanguage(_)
                | Self::EngineTerminated
        )
    }
}
