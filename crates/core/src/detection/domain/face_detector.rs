use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Takes `&self` because one detector instance is shared between the
/// pipeline thread and source-image registration; implementations guard
/// their inference session internally.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>>;
}
