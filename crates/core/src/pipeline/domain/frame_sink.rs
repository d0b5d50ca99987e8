use std::fmt;
use std::time::Duration;

use crate::shared::frame::Frame;

/// What happened to a frame before it was presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusTag {
    /// Detection disabled or failed; the frame is shown as captured.
    Raw,
    NoFaceDetected,
    Swapped,
    /// Faces found but no active source; faces are outlined.
    DetectedOnly,
    ModelNotReady,
}

impl StatusTag {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusTag::Raw => "raw",
            StatusTag::NoFaceDetected => "no-face-detected",
            StatusTag::Swapped => "swapped",
            StatusTag::DetectedOnly => "detected-only",
            StatusTag::ModelNotReady => "model-not-ready",
        }
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Shown,
    /// The sink could not accept the frame within the timeout.
    Dropped,
}

/// Display surface fed by the pipeline.
pub trait FrameSink: Send {
    /// Hands `frame` to the display, waiting at most `timeout`. A sink that
    /// cannot accept it in time returns `Presented::Dropped` rather than
    /// blocking the pipeline.
    fn present(
        &mut self,
        frame: Frame,
        tag: StatusTag,
        timeout: Duration,
    ) -> Result<Presented, Box<dyn std::error::Error>>;
}
