use thiserror::Error;

use crate::source::domain::source_face::SourceFaceId;

/// Errors surfaced to the control surface and between pipeline components.
///
/// Dropped frames are deliberately absent: overwriting a stale frame is
/// counted by the frame buffer, never reported as a failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaceSwapError {
    #[error("models are not ready")]
    ModelNotReady,
    #[error("model load failed: {0}")]
    ModelLoadFailed(String),
    #[error("no usable face in source image: {0}")]
    InvalidImage(String),
    #[error("unknown source face id {0}")]
    UnknownId(SourceFaceId),
    #[error("face detection failed: {0}")]
    DetectionFailed(String),
    #[error("face swap failed: {0}")]
    SwapFailed(String),
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u32),
    #[error("{0} thread panicked")]
    WorkerPanicked(String),
}
