use thiserror::Error;

use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// A single inference call failed; the frame is treated as having no
/// detections.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("detection failed: {0}")]
    Failed(String),
    #[error("detector rejected {width}x{height} input: {reason}")]
    InvalidInput {
        width: u32,
        height: u32,
        reason: String,
    },
}

impl DetectionError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        DetectionError::Failed(err.to_string())
    }
}

/// Domain interface for the black-box object classifier.
///
/// Boxes are returned in the coordinate space of `image`. The detector is
/// shared read-only across frames and sessions, hence `&self` and `Sync`.
pub trait ObjectDetector: Send + Sync {
    fn predict(&self, image: &Frame, confidence: f64) -> Result<Vec<Detection>, DetectionError>;
}
